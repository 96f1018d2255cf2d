//! Loaded question-answering model: tokenizer plus network on one device.

use std::path::Path;

use tokenizers::{Encoding, Tokenizer};

use super::bert_qa::BertQa;
use super::device::{select_device, DeviceKind};
use super::span::{SpanConfig, SpanLogits};
use super::tokenizer::{configure_window, load_tokenizer};
use crate::api::model_location::ModelLocation;
use crate::error::Result;

/// Network half of a QA model: scores every token as span start and end.
///
/// Implementations must not mutate state during scoring; one instance is
/// shared by all in-flight requests.
pub trait SpanScorer: Send + Sync {
    /// Start/end logits, one entry per token of `encoding`
    fn span_logits(&self, encoding: &Encoding) -> Result<SpanLogits>;

    /// Longest sequence the network accepts, when it declares one
    fn max_positions(&self) -> Option<usize> {
        None
    }
}

/// Settings fixed when the model is loaded
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub use_gpu: bool,
    pub max_seq_len: usize,
    pub span: SpanConfig,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            use_gpu: true,
            max_seq_len: 512,
            span: SpanConfig::default(),
        }
    }
}

/// Tokenizer and network, always present together
pub struct QaModel {
    model_name: String,
    location: ModelLocation,
    tokenizer: Tokenizer,
    network: Box<dyn SpanScorer>,
    device: DeviceKind,
    max_seq_len: usize,
    span: SpanConfig,
}

impl QaModel {
    /// Load tokenizer and network from a resolved model directory.
    ///
    /// Blocking and potentially slow; call from `spawn_blocking` inside async code.
    pub fn load(model_name: &str, location: ModelLocation, model_dir: &Path, options: &LoadOptions) -> Result<Self> {
        let (device, kind) = select_device(options.use_gpu)?;
        tracing::info!("Loading QA model '{}' from {} on {}", model_name, model_dir.display(), kind);

        let tokenizer = load_tokenizer(model_dir)?;
        let network = BertQa::load(model_dir, &device)?;

        Self::from_parts(model_name, location, tokenizer, Box::new(network), kind, options)
    }

    /// Assemble a model from already constructed parts.
    ///
    /// The encoding window is `max_seq_len`, lowered to the network's position limit.
    pub fn from_parts(
        model_name: &str,
        location: ModelLocation,
        mut tokenizer: Tokenizer,
        network: Box<dyn SpanScorer>,
        device: DeviceKind,
        options: &LoadOptions,
    ) -> Result<Self> {
        let max_seq_len = network
            .max_positions()
            .map_or(options.max_seq_len, |limit| limit.min(options.max_seq_len));
        configure_window(&mut tokenizer, max_seq_len)?;

        Ok(Self {
            model_name: model_name.to_string(),
            location,
            tokenizer,
            network,
            device,
            max_seq_len,
            span: options.span,
        })
    }

    /// Answer `question` from `context`; see [`super::inference::infer`]
    pub fn answer(&self, context: &str, question: &str) -> Result<String> {
        super::inference::infer(self, context, question)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn location(&self) -> &ModelLocation {
        &self.location
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn span_config(&self) -> &SpanConfig {
        &self.span
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn network(&self) -> &dyn SpanScorer {
        self.network.as_ref()
    }
}

impl std::fmt::Debug for QaModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaModel")
            .field("model_name", &self.model_name)
            .field("location", &self.location)
            .field("device", &self.device)
            .field("max_seq_len", &self.max_seq_len)
            .field("span", &self.span)
            .finish()
    }
}
