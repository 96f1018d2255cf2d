//! Hugging Face Hub registry backed by `hf_hub`

use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiBuilder};
use std::path::PathBuf;

use crate::api::model_registry::ModelRegistry;
use crate::error::{QaError, Result};

/// Hub client authenticated with the service token
pub struct HuggingFaceRegistry {
    api: Api,
}

impl HuggingFaceRegistry {
    /// Create a client that keeps hub blobs under `hub_cache`
    pub fn new(token: Option<String>, hub_cache: PathBuf) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_token(token)
            .with_cache_dir(hub_cache)
            .with_progress(false)
            .build()
            .map_err(|e| QaError::Config(format!("Failed to initialize HF API: {}", e)))?;

        Ok(Self { api })
    }

    /// Strip an optional `hf://` scheme from a repository id
    pub fn parse_repo_id(model_id: &str) -> &str {
        model_id.strip_prefix("hf://").unwrap_or(model_id)
    }
}

#[async_trait]
impl ModelRegistry for HuggingFaceRegistry {
    async fn fetch_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf> {
        let repo_id = Self::parse_repo_id(repo_id);
        tracing::debug!("Fetching {}/{} from Hugging Face Hub", repo_id, filename);

        self.api
            .model(repo_id.to_string())
            .get(filename)
            .await
            .map_err(|e| QaError::Download(format!("{}/{}: {}", repo_id, filename, e)))
    }
}
