//! Error types for the question-answering service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// A specialized Result type for qaserve operations.
pub type Result<T> = std::result::Result<T, QaError>;

/// The error type for qaserve operations.
///
/// Startup kinds (`Config`, `NotFound`, `Download`, `Load`) are fatal and stop
/// the process. `Unavailable` and `Inference` are scoped to a single request.
#[derive(Debug, Error)]
pub enum QaError {
    /// Missing or invalid configuration, e.g. no registry token
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model is neither cached locally nor resolvable remotely
    #[error("Model not found: {0}")]
    NotFound(String),

    /// Registry download failed
    #[error("Download error: {0}")]
    Download(String),

    /// Local artifacts could not be turned into a tokenizer or network
    #[error("Load error: {0}")]
    Load(String),

    /// Tokenization or forward pass failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Request arrived while no model is installed
    #[error("{0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// HTTP status used when this error terminates a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            QaError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QaError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for QaError {
    fn from(err: config::ConfigError) -> Self {
        QaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QaError {
    fn from(err: serde_json::Error) -> Self {
        QaError::Load(err.to_string())
    }
}

/// Body of every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for QaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
