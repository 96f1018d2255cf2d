//! Model location resolution: local cache first, registry download otherwise.
//!
//! Downloads are staged in a hidden sibling directory, unique per process and
//! attempt, and renamed into place once every required artifact is present, so
//! an interrupted download never looks like a complete model on the next start.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::api::model_registry::{has_model_files, ModelRegistry, MODEL_ARTIFACTS};
use crate::error::{QaError, Result};

/// Where a model lives locally and, optionally, remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelLocation {
    pub local_path: PathBuf,
    pub cloud_uri: Option<String>,
}

impl ModelLocation {
    /// Location for `model_name` under `cache_dir`.
    ///
    /// An existing directory passed as the name is used in place with no remote.
    pub fn for_model(cache_dir: &Path, model_name: &str) -> Self {
        let as_path = Path::new(model_name);
        if as_path.is_dir() {
            return Self {
                local_path: as_path.to_path_buf(),
                cloud_uri: None,
            };
        }

        let repo_id = model_name.strip_prefix("hf://").unwrap_or(model_name);
        Self {
            local_path: cache_dir.join(sanitize_model_name(repo_id)),
            cloud_uri: Some(repo_id.to_string()),
        }
    }

    /// Location with no remote fallback
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: path.into(),
            cloud_uri: None,
        }
    }
}

/// Directory name for a model identifier: path separators, `:` and whitespace
/// become `-`; a leading `.` is escaped so names never collide with staging dirs.
pub fn sanitize_model_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();

    if sanitized.is_empty() || sanitized.starts_with('.') {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

/// Staging directories older than this are treated as abandoned
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

const COMMIT_ATTEMPTS: usize = 3;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

fn staging_prefix(local_path: &Path) -> String {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    format!(".{}.partial", name)
}

/// Hidden sibling unique to this process and attempt
fn staging_dir(local_path: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    local_path.with_file_name(format!(
        "{}-{}-{}",
        staging_prefix(local_path),
        std::process::id(),
        seq
    ))
}

async fn remove_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", staging.display(), e);
        }
    }
}

/// Resolves model locations to complete local directories
pub struct ModelResolver {
    registry: Arc<dyn ModelRegistry>,
    cache_dir: PathBuf,
    stale_after: Duration,
}

impl ModelResolver {
    pub fn new(registry: Arc<dyn ModelRegistry>, cache_dir: PathBuf) -> Self {
        Self {
            registry,
            cache_dir,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Age after which another attempt's staging directory may be removed
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Location for `model_name` within this resolver's cache
    pub fn locate(&self, model_name: &str) -> ModelLocation {
        ModelLocation::for_model(&self.cache_dir, model_name)
    }

    /// Return the local directory for `location`, downloading it if needed.
    ///
    /// A directory that already holds the model is returned without touching
    /// the registry. Concurrent resolvers sharing a cache each stage into their
    /// own directory; whichever finishes second adopts the first one's result.
    pub async fn resolve(&self, location: &ModelLocation) -> Result<PathBuf> {
        let local_path = &location.local_path;
        if has_model_files(local_path) {
            info!("Using cached model at {}", local_path.display());
            return Ok(local_path.clone());
        }

        let repo_id = location.cloud_uri.as_deref().ok_or_else(|| {
            QaError::NotFound(format!(
                "{} has no model files and no remote identifier was given",
                local_path.display()
            ))
        })?;

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        self.sweep_stale_staging(local_path).await;

        let staging = staging_dir(local_path);
        fs::create_dir_all(&staging).await?;

        warn!("Downloading model from Hugging Face: {}", repo_id);
        if let Err(e) = self.download_into(repo_id, &staging).await {
            remove_staging(&staging).await;
            return Err(e);
        }

        self.commit(&staging, local_path).await?;
        info!("Model saved to: {}", local_path.display());
        Ok(local_path.clone())
    }

    /// Move a complete staging directory onto `local_path`.
    ///
    /// Only renames touch `local_path`: an incomplete directory is first moved
    /// aside, so a complete one is never deleted in place.
    async fn commit(&self, staging: &Path, local_path: &Path) -> Result<()> {
        let mut last_error = None;

        for _ in 0..COMMIT_ATTEMPTS {
            if has_model_files(local_path) {
                info!("{} was completed concurrently, discarding own download", local_path.display());
                remove_staging(staging).await;
                return Ok(());
            }

            if fs::metadata(local_path).await.is_ok() {
                warn!("Replacing incomplete model directory {}", local_path.display());
                let discarded = staging_dir(local_path);
                match fs::rename(local_path, &discarded).await {
                    Ok(()) => remove_staging(&discarded).await,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            match fs::rename(staging, local_path).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        remove_staging(staging).await;
        if has_model_files(local_path) {
            return Ok(());
        }
        Err(last_error.map(QaError::from).unwrap_or_else(|| {
            QaError::Download(format!("Could not move model into {}", local_path.display()))
        }))
    }

    /// Remove staging directories for `local_path` abandoned by earlier attempts
    async fn sweep_stale_staging(&self, local_path: &Path) {
        let Some(parent) = local_path.parent() else {
            return;
        };
        let prefix = format!("{}-", staging_prefix(local_path));
        let mut entries = match fs::read_dir(parent).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan {} for partial downloads: {}", parent.display(), e);
                return;
            }
        };

        let now = SystemTime::now();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let stale = entry
                .metadata()
                .await
                .and_then(|meta| meta.modified())
                .map(|modified| {
                    now.duration_since(modified)
                        .map_or(false, |age| age >= self.stale_after)
                })
                .unwrap_or(false);

            if stale {
                warn!("Removing abandoned partial download at {}", entry.path().display());
                remove_staging(&entry.path()).await;
            } else {
                debug!("Leaving in-progress download at {}", entry.path().display());
            }
        }
    }

    async fn download_into(&self, repo_id: &str, staging: &Path) -> Result<()> {
        for spec in MODEL_ARTIFACTS {
            let mut last_error = None;
            let mut fetched = false;

            for filename in spec.alternatives {
                match self.registry.fetch_file(repo_id, filename).await {
                    Ok(source) => {
                        fs::copy(&source, staging.join(filename)).await?;
                        debug!("Stored {}", filename);
                        fetched = true;
                        break;
                    }
                    Err(e) => {
                        debug!("{} unavailable: {}", filename, e);
                        last_error = Some(e);
                    }
                }
            }

            if spec.required && !fetched {
                return Err(QaError::Download(format!(
                    "{} provides none of [{}]{}",
                    repo_id,
                    spec.alternatives.join(", "),
                    last_error.map(|e| format!(": {}", e)).unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_model_name() {
        assert_eq!(sanitize_model_name("deepset/bert-base-cased-squad2"), "deepset-bert-base-cased-squad2");
        assert_eq!(sanitize_model_name("org/name:rev"), "org-name-rev");
        assert_eq!(sanitize_model_name("a b\\c"), "a-b-c");
        assert_eq!(sanitize_model_name("../escape"), "_..-escape");
        assert_eq!(sanitize_model_name(""), "_");
    }

    #[test]
    fn test_location_for_hub_id() {
        let location = ModelLocation::for_model(Path::new("/cache"), "hf://org/model");
        assert_eq!(location.local_path, PathBuf::from("/cache/org-model"));
        assert_eq!(location.cloud_uri.as_deref(), Some("org/model"));
    }

    #[test]
    fn test_location_for_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().to_str().unwrap();
        let location = ModelLocation::for_model(Path::new("/cache"), name);
        assert_eq!(location, ModelLocation::local(dir.path()));
    }

    #[test]
    fn test_staging_dir_is_unique_hidden_sibling() {
        let local = Path::new("/cache/org-model");
        let first = staging_dir(local);
        let second = staging_dir(local);

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/cache")));
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!(".org-model.partial-{}-", std::process::id())));
    }
}
