//! Question answering over a loaded model.

use super::model::QaModel;
use super::span::select_span;
use super::tokenizer::{context_mask, decode_span, encode_pair};
use crate::error::{QaError, Result};

/// Encode the pair, score every token, decode the selected span.
///
/// Returns an empty string when no span is selected. Inputs longer than the
/// model window are truncated, never rejected.
pub fn infer(model: &QaModel, context: &str, question: &str) -> Result<String> {
    let encoding = encode_pair(model.tokenizer(), question, context)?;
    let ids = encoding.get_ids();
    if ids.is_empty() {
        return Ok(String::new());
    }

    let logits = model.network().span_logits(&encoding)?;
    if logits.start.len() != ids.len() || logits.end.len() != ids.len() {
        return Err(QaError::Inference(format!(
            "Network returned {}/{} logits for {} tokens",
            logits.start.len(),
            logits.end.len(),
            ids.len()
        )));
    }

    let span = match select_span(&logits, &context_mask(&encoding), model.span_config()) {
        Some(span) => span,
        None => {
            tracing::debug!("No answer span for question of {} tokens", ids.len());
            return Ok(String::new());
        }
    };

    tracing::trace!("Selected tokens {}..={}", span.start, span.end);
    decode_span(model.tokenizer(), &ids[span.start..=span.end])
}
