//! Question-answering endpoints

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    error::{QaError, Result},
    runtime::{DeviceKind, QaModel},
    server::state::{AppState, RequestGuard},
};

/// Message returned while no model is installed
pub const MODEL_NOT_LOADED: &str = "QA model is not loaded";

/// Create the question-answering router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/qa", post(answer_question))
        .route("/model", get(model_info))
}

/// Question-answering request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QaQuery {
    /// Passage containing the information needed to answer
    pub context: String,
    /// Question to answer from the passage
    pub question: String,
}

/// Question-answering response; `answer` is empty when no span was found
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QaResponse {
    pub answer: String,
}

/// Description of the installed model
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_name: String,
    pub local_path: PathBuf,
    pub cloud_uri: Option<String>,
    pub device: DeviceKind,
    pub span_strategy: &'static str,
    pub max_seq_len: usize,
}

fn loaded_model(state: &AppState) -> Result<Arc<QaModel>> {
    state
        .model_slot
        .get()
        .ok_or_else(|| QaError::Unavailable(MODEL_NOT_LOADED.to_string()))
}

/// Answer a question from the supplied context
async fn answer_question(
    State(state): State<AppState>,
    Json(query): Json<QaQuery>,
) -> Result<Json<QaResponse>> {
    let guard = RequestGuard::new(&state.metrics);

    let model = match loaded_model(&state) {
        Ok(model) => model,
        Err(e) => {
            guard.mark_failed();
            return Err(e);
        }
    };

    debug!(
        "QA request - context: {} chars, question: {} chars",
        query.context.len(),
        query.question.len()
    );
    let start_time = Instant::now();

    let result = tokio::task::spawn_blocking(move || model.answer(&query.context, &query.question))
        .await
        .map_err(|e| QaError::Inference(format!("Inference task failed: {}", e)))
        .and_then(|answer| answer);

    match result {
        Ok(answer) => {
            info!("Answered in {:?} ({} chars)", start_time.elapsed(), answer.len());
            Ok(Json(QaResponse { answer }))
        }
        Err(e) => {
            guard.mark_failed();
            Err(e)
        }
    }
}

/// Describe the installed model
async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfoResponse>> {
    let model = loaded_model(&state)?;
    let location = model.location();

    Ok(Json(ModelInfoResponse {
        model_name: model.model_name().to_string(),
        local_path: location.local_path.clone(),
        cloud_uri: location.cloud_uri.clone(),
        device: model.device(),
        span_strategy: model.span_config().strategy.as_str(),
        max_seq_len: model.max_seq_len(),
    }))
}
