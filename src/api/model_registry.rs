//! Model registry abstraction for remote model sources

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::runtime::bert_qa::{CONFIG_JSON, PYTORCH_WEIGHTS, SAFETENSORS_WEIGHTS};
use crate::runtime::tokenizer::{TOKENIZER_CONFIG, TOKENIZER_JSON, VOCAB_TXT};

/// Remote store of model repositories
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fetch one file of `repo_id`, returning a readable local copy.
    ///
    /// Fails when the repository or the file does not exist.
    async fn fetch_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf>;
}

/// One artifact of a model directory; the first alternative present is used
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSpec {
    pub alternatives: &'static [&'static str],
    pub required: bool,
}

impl ArtifactSpec {
    /// First alternative present in `dir`
    pub fn present_in(&self, dir: &Path) -> Option<&'static str> {
        self.alternatives.iter().copied().find(|name| dir.join(name).is_file())
    }
}

/// Files that make up a question-answering model directory
pub const MODEL_ARTIFACTS: &[ArtifactSpec] = &[
    ArtifactSpec { alternatives: &[CONFIG_JSON], required: true },
    ArtifactSpec { alternatives: &[TOKENIZER_JSON, VOCAB_TXT], required: true },
    ArtifactSpec { alternatives: &[SAFETENSORS_WEIGHTS, PYTORCH_WEIGHTS], required: true },
    ArtifactSpec { alternatives: &[TOKENIZER_CONFIG], required: false },
    ArtifactSpec { alternatives: &["special_tokens_map.json"], required: false },
];

/// True when `dir` holds every required artifact
pub fn has_model_files(dir: &Path) -> bool {
    dir.is_dir()
        && MODEL_ARTIFACTS
            .iter()
            .filter(|spec| spec.required)
            .all(|spec| spec.present_in(dir).is_some())
}
