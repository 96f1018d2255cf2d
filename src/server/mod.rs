//! qaserve HTTP server
//!
//! Routes:
//! - `POST /qa` answers a question from a context passage
//! - `GET /model` describes the installed model
//! - `GET <health_route>` liveness check (`/health` by default)

use anyhow::Result;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod routes;
pub mod state;

use state::AppState;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let health_route = state.config.server.health_route.clone();
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route(&health_route, get(health_check))
        .merge(routes::qa::create_router())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout_duration))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
///
/// Reports liveness only; it stays healthy whether or not a model is installed.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Serve `state` on `addr` until `shutdown` resolves
pub async fn start_server<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Starting qaserve on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped accepting requests");
    Ok(())
}

/// Resolves on SIGTERM or SIGINT
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to register signal handlers: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}

/// Fallback for non-Unix systems
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
}
