//! BERT encoder with a linear start/end head, as in `BertForQuestionAnswering`.
//!
//! Checkpoints store the encoder under `bert.` and the head under
//! `qa_outputs` (`hidden_size -> 2`). Candle's `BertModel::load` falls back to
//! the `bert.` prefix using `model_type` from `config.json`.

use std::path::Path;

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Encoding;

use super::model::SpanScorer;
use super::span::SpanLogits;
use crate::error::{QaError, Result};

pub const CONFIG_JSON: &str = "config.json";
pub const SAFETENSORS_WEIGHTS: &str = "model.safetensors";
pub const PYTORCH_WEIGHTS: &str = "pytorch_model.bin";

/// Fields read from `config.json` beyond what candle's BERT config needs
#[derive(Debug, Deserialize)]
struct ArchitectureHints {
    #[serde(default)]
    model_type: Option<String>,
    #[serde(default)]
    max_position_embeddings: Option<usize>,
}

/// Extractive QA network on a fixed device
pub struct BertQa {
    bert: BertModel,
    qa_outputs: Linear,
    device: Device,
    max_positions: Option<usize>,
}

impl BertQa {
    /// Load config and weights from `model_dir` onto `device`
    pub fn load(model_dir: &Path, device: &Device) -> Result<Self> {
        let config_path = model_dir.join(CONFIG_JSON);
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            QaError::Load(format!("Failed to read config from {}: {}", config_path.display(), e))
        })?;

        let hints: ArchitectureHints = serde_json::from_str(&raw)?;
        match hints.model_type.as_deref() {
            None | Some("bert") => {}
            Some(other) => {
                return Err(QaError::Load(format!(
                    "Unsupported model_type '{}', expected a BERT question-answering checkpoint",
                    other
                )))
            }
        }

        let config: BertConfig = serde_json::from_str(&raw)
            .map_err(|e| QaError::Load(format!("Invalid BERT config: {}", e)))?;

        let vb = weights(model_dir, device)?;
        let bert = BertModel::load(vb.clone(), &config)
            .map_err(|e| QaError::Load(format!("Failed to load BERT encoder: {}", e)))?;
        let qa_outputs = candle_nn::linear(config.hidden_size, 2, vb.pp("qa_outputs"))
            .map_err(|e| QaError::Load(format!("Failed to load qa_outputs head: {}", e)))?;

        Ok(Self {
            bert,
            qa_outputs,
            device: device.clone(),
            max_positions: hints.max_position_embeddings,
        })
    }

    fn forward(&self, encoding: &Encoding) -> candle_core::Result<SpanLogits> {
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let hidden = self.bert.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        // (1, seq, 2) -> (seq, 2)
        let logits = self.qa_outputs.forward(&hidden)?.squeeze(0)?.to_dtype(DType::F32)?;

        Ok(SpanLogits {
            start: logits.i((.., 0))?.to_vec1::<f32>()?,
            end: logits.i((.., 1))?.to_vec1::<f32>()?,
        })
    }
}

fn weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join(SAFETENSORS_WEIGHTS);
    if safetensors.exists() {
        tracing::debug!("Memory-mapping {}", safetensors.display());
        // SAFETY: the file is owned by the model cache and not modified while mapped.
        return unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device) }
            .map_err(|e| QaError::Load(format!("Failed to load model weights: {}", e)));
    }

    let pytorch = model_dir.join(PYTORCH_WEIGHTS);
    if pytorch.exists() {
        tracing::debug!("Reading PyTorch checkpoint {}", pytorch.display());
        return VarBuilder::from_pth(&pytorch, DType::F32, device)
            .map_err(|e| QaError::Load(format!("Failed to load model weights: {}", e)));
    }

    Err(QaError::Load(format!(
        "No {} or {} in {}",
        SAFETENSORS_WEIGHTS,
        PYTORCH_WEIGHTS,
        model_dir.display()
    )))
}

impl SpanScorer for BertQa {
    fn span_logits(&self, encoding: &Encoding) -> Result<SpanLogits> {
        self.forward(encoding)
            .map_err(|e| QaError::Inference(format!("Forward pass failed: {}", e)))
    }

    fn max_positions(&self) -> Option<usize> {
        self.max_positions
    }
}
