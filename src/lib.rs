//! Extractive question answering over HTTP.
//!
//! A pretrained BERT question-answering checkpoint is resolved from the local
//! cache or the Hugging Face Hub, loaded once at startup and shared by every
//! request to `POST /qa`.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod runtime;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use api::{ModelLocation, ModelRegistry, ModelResolver};
pub use config::ServiceConfig;
pub use error::{QaError, Result};
pub use runtime::{infer, QaModel, SpanScorer, SpanStrategy};
pub use server::{create_app, state::AppState};
