//! Model runtime: device selection, tokenizer, BERT QA network and span decoding.

pub mod bert_qa;
pub mod device;
pub mod inference;
pub mod model;
pub mod span;
pub mod tokenizer;

pub use device::DeviceKind;
pub use inference::infer;
pub use model::{LoadOptions, QaModel, SpanScorer};
pub use span::{SpanConfig, SpanLogits, SpanStrategy, TokenSpan};
