//! Answer span selection over start/end logits.

use serde::{Deserialize, Serialize};

/// How the answer span is chosen from the two logit vectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SpanStrategy {
    /// Argmax of start and argmax of end taken separately.
    /// An end before the start yields no span.
    Independent,
    /// Highest `start[i] + end[j]` with `i <= j`, bounded length, inside the context.
    #[default]
    BestValid,
}

impl SpanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStrategy::Independent => "independent",
            SpanStrategy::BestValid => "best-valid",
        }
    }
}

/// Per-token start and end scores produced by the network
#[derive(Debug, Clone, PartialEq)]
pub struct SpanLogits {
    pub start: Vec<f32>,
    pub end: Vec<f32>,
}

/// Inclusive token range of the chosen answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SpanConfig {
    pub strategy: SpanStrategy,
    pub max_answer_len: usize,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            strategy: SpanStrategy::BestValid,
            max_answer_len: 30,
        }
    }
}

/// Pick the answer span. `in_context[i]` marks tokens belonging to the passage;
/// only `BestValid` consults it.
pub fn select_span(logits: &SpanLogits, in_context: &[bool], config: &SpanConfig) -> Option<TokenSpan> {
    match config.strategy {
        SpanStrategy::Independent => independent_span(logits),
        SpanStrategy::BestValid => best_valid_span(logits, in_context, config.max_answer_len),
    }
}

fn argmax(scores: &[f32]) -> Option<usize> {
    // First index wins on ties.
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((idx, score)),
        })
        .map(|(idx, _)| idx)
}

fn independent_span(logits: &SpanLogits) -> Option<TokenSpan> {
    let start = argmax(&logits.start)?;
    let end = argmax(&logits.end)?;
    if end < start {
        return None;
    }
    Some(TokenSpan { start, end })
}

fn best_valid_span(logits: &SpanLogits, in_context: &[bool], max_answer_len: usize) -> Option<TokenSpan> {
    let len = logits.start.len().min(logits.end.len()).min(in_context.len());
    let mut best: Option<(TokenSpan, f32)> = None;

    for start in (0..len).filter(|&i| in_context[i]) {
        let last = (start + max_answer_len).min(len);
        for end in start..last {
            if !in_context[end] {
                break;
            }
            let score = logits.start[start] + logits.end[end];
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((TokenSpan { start, end }, score));
            }
        }
    }

    best.map(|(span, _)| span)
}
