mod common;

use common::{FakeRegistry, VOCAB};
use qaserve_core::api::has_model_files;
use qaserve_core::{ModelLocation, ModelResolver, QaError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn resolver(registry: &Arc<FakeRegistry>, cache_dir: &Path) -> ModelResolver {
    ModelResolver::new(registry.clone(), cache_dir.to_path_buf())
}

fn hidden_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect()
}

#[tokio::test]
async fn test_downloads_into_cache() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path());

    let location = resolver.locate("deepset/bert-base-cased-squad2");
    assert_eq!(location.cloud_uri.as_deref(), Some("deepset/bert-base-cased-squad2"));

    let model_dir = resolver.resolve(&location).await.unwrap();
    assert_eq!(model_dir, cache.path().join("deepset-bert-base-cased-squad2"));
    assert!(has_model_files(&model_dir));
    assert_eq!(
        std::fs::read_to_string(model_dir.join("vocab.txt")).unwrap(),
        VOCAB.join("\n")
    );
    assert!(hidden_entries(cache.path()).is_empty());
}

#[tokio::test]
async fn test_second_resolve_uses_cache() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path());
    let location = resolver.locate("deepset/bert-base-cased-squad2");

    let first = resolver.resolve(&location).await.unwrap();
    let fetches = registry.fetch_count();
    assert!(fetches > 0);

    let second = resolver.resolve(&location).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.fetch_count(), fetches);
}

#[tokio::test]
async fn test_local_model_without_remote_is_not_found() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path());

    let location = ModelLocation::local(cache.path().join("missing"));
    let err = resolver.resolve(&location).await.unwrap_err();

    assert!(matches!(err, QaError::NotFound(_)));
    assert_eq!(registry.fetch_count(), 0);
}

#[tokio::test]
async fn test_existing_local_directory_is_used_in_place() {
    let cache = tempfile::tempdir().unwrap();
    let model = tempfile::tempdir().unwrap();
    std::fs::write(model.path().join("config.json"), "{}").unwrap();
    std::fs::write(model.path().join("tokenizer.json"), "{}").unwrap();
    std::fs::write(model.path().join("model.safetensors"), b"weights").unwrap();

    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path());
    let location = resolver.locate(model.path().to_str().unwrap());

    assert!(location.cloud_uri.is_none());
    assert_eq!(resolver.resolve(&location).await.unwrap(), model.path());
    assert_eq!(registry.fetch_count(), 0);
}

#[tokio::test]
async fn test_failed_download_leaves_nothing_behind() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint().failing_on("model.safetensors"));
    let resolver = resolver(&registry, cache.path());
    let location = resolver.locate("org/broken");

    let err = resolver.resolve(&location).await.unwrap_err();
    assert!(matches!(err, QaError::Download(_)));
    assert!(!location.local_path.exists());
    assert!(hidden_entries(cache.path()).is_empty());
}

#[tokio::test]
async fn test_incomplete_directory_is_replaced() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path()).with_stale_after(Duration::ZERO);
    let location = resolver.locate("org/model");

    std::fs::create_dir_all(&location.local_path).unwrap();
    std::fs::write(location.local_path.join("config.json"), "{}").unwrap();
    std::fs::write(location.local_path.join("stray.tmp"), "partial").unwrap();
    let abandoned = cache.path().join(".org-model.partial-4242-0");
    std::fs::create_dir_all(&abandoned).unwrap();
    std::fs::write(abandoned.join("config.json"), "{}").unwrap();

    let model_dir = resolver.resolve(&location).await.unwrap();
    assert!(has_model_files(&model_dir));
    assert!(!model_dir.join("stray.tmp").exists());
    assert!(hidden_entries(cache.path()).is_empty());
}

#[tokio::test]
async fn test_falls_back_to_alternative_artifacts() {
    let cache = tempfile::tempdir().unwrap();
    let vocab = VOCAB.join("\n");
    let registry = Arc::new(FakeRegistry::with_files(&[
        ("config.json", &b"{}"[..]),
        ("vocab.txt", vocab.as_bytes()),
        ("pytorch_model.bin", &b"weights"[..]),
    ]));
    let resolver = resolver(&registry, cache.path());
    let location = resolver.locate("hf://org/legacy");

    let model_dir = resolver.resolve(&location).await.unwrap();
    assert!(model_dir.join("pytorch_model.bin").is_file());
    assert!(model_dir.join("vocab.txt").is_file());
    assert!(!model_dir.join("tokenizer.json").exists());
    assert!(!model_dir.join("model.safetensors").exists());
}

#[tokio::test]
async fn test_missing_required_artifact_is_download_error() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::with_files(&[("config.json", &b"{}"[..])]));
    let resolver = resolver(&registry, cache.path());

    let err = resolver.resolve(&resolver.locate("org/empty")).await.unwrap_err();
    assert!(matches!(err, QaError::Download(_)));
    assert!(!cache.path().join("org-empty").exists());
}

#[tokio::test]
async fn test_recent_foreign_staging_is_left_alone() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let resolver = resolver(&registry, cache.path());
    let location = resolver.locate("org/model");

    // Another replica's download, still in progress
    let in_progress = cache.path().join(".org-model.partial-4242-0");
    std::fs::create_dir_all(&in_progress).unwrap();

    let model_dir = resolver.resolve(&location).await.unwrap();
    assert!(has_model_files(&model_dir));
    assert!(in_progress.is_dir());
    assert_eq!(hidden_entries(cache.path()), vec![".org-model.partial-4242-0".to_string()]);
}

#[tokio::test]
async fn test_concurrent_resolves_share_one_cache() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());
    let first = resolver(&registry, cache.path());
    let second = resolver(&registry, cache.path());
    let location = first.locate("deepset/bert-base-cased-squad2");

    let (a, b) = tokio::join!(first.resolve(&location), second.resolve(&location));
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a, b);
    assert!(has_model_files(&a));
    assert!(hidden_entries(cache.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_resolves_from_separate_tasks() {
    let cache = tempfile::tempdir().unwrap();
    let registry = Arc::new(FakeRegistry::bert_checkpoint());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver(&registry, cache.path());
            tokio::spawn(async move {
                let location = resolver.locate("org/shared");
                resolver.resolve(&location).await
            })
        })
        .collect();

    for handle in handles {
        let model_dir = handle.await.unwrap().unwrap();
        assert!(has_model_files(&model_dir));
    }
    assert!(hidden_entries(cache.path()).is_empty());
}
