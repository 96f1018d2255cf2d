//! Startup sequence: resolve the model location, then load it.

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{HuggingFaceRegistry, ModelLocation, ModelResolver};
use crate::config::ServiceConfig;
use crate::error::{QaError, Result};
use crate::runtime::{LoadOptions, QaModel, SpanConfig};

/// Build the resolver for `config`, backed by the Hugging Face Hub
pub fn resolver(config: &ServiceConfig) -> Result<ModelResolver> {
    let cache_dir = config.cache_dir()?;
    let registry = HuggingFaceRegistry::new(config.auth_token.clone(), cache_dir.join(".hub"))?;
    Ok(ModelResolver::new(Arc::new(registry), cache_dir))
}

/// Load-time options derived from configuration
pub fn load_options(config: &ServiceConfig) -> LoadOptions {
    LoadOptions {
        use_gpu: config.model.use_gpu,
        max_seq_len: config.model.max_seq_len,
        span: SpanConfig {
            strategy: config.model.span_strategy,
            max_answer_len: config.model.max_answer_len,
        },
    }
}

/// Make sure the configured model is available locally
pub async fn resolve_model(
    resolver: &ModelResolver,
    model_name: &str,
) -> Result<(ModelLocation, PathBuf)> {
    let location = resolver.locate(model_name);
    let model_dir = resolver.resolve(&location).await?;
    Ok((location, model_dir))
}

/// Resolve and load the configured model.
///
/// Loading runs on the blocking pool; callers must await this before serving.
pub async fn load_model(config: &ServiceConfig) -> Result<QaModel> {
    let resolver = resolver(config)?;
    let model_name = config.model.name.clone();
    let (location, model_dir) = resolve_model(&resolver, &model_name).await?;
    let options = load_options(config);

    tokio::task::spawn_blocking(move || QaModel::load(&model_name, location, &model_dir, &options))
        .await
        .map_err(|e| QaError::Load(format!("Model loading task failed: {}", e)))?
}
