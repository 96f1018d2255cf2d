//! Server state management

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::runtime::QaModel;

/// Holder of the single loaded model.
///
/// Filled once after startup loading and cleared once after the server stops.
/// Readers clone the inner `Arc`, so the lock is never held during inference.
#[derive(Default)]
pub struct ModelSlot {
    inner: RwLock<Option<Arc<QaModel>>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `model`, returning the one it replaces
    pub fn install(&self, model: Arc<QaModel>) -> Option<Arc<QaModel>> {
        self.inner.write().replace(model)
    }

    pub fn get(&self) -> Option<Arc<QaModel>> {
        self.inner.read().clone()
    }

    /// Drop the slot's reference; memory is released once in-flight requests finish
    pub fn clear(&self) -> Option<Arc<QaModel>> {
        self.inner.write().take()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }
}

/// Request counters
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests processed
    pub total_requests: AtomicU64,

    /// Requests that ended in an error response
    pub failed_requests: AtomicU64,

    /// Active requests
    pub active_requests: AtomicU32,
}

impl Metrics {
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "total_requests": self.total_requests.load(Ordering::Relaxed),
            "failed_requests": self.failed_requests.load(Ordering::Relaxed),
            "active_requests": self.active_requests.load(Ordering::Relaxed),
        })
    }
}

/// RAII guard counting a request as active until dropped
pub struct RequestGuard<'a> {
    metrics: &'a Metrics,
}

impl<'a> RequestGuard<'a> {
    pub fn new(metrics: &'a Metrics) -> Self {
        metrics.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics.active_requests.fetch_add(1, Ordering::Relaxed);
        Self { metrics }
    }

    pub fn mark_failed(&self) {
        self.metrics.failed_requests.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.metrics.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    /// The loaded model, absent before startup completes and after shutdown
    pub model_slot: Arc<ModelSlot>,

    /// Service configuration
    pub config: Arc<ServiceConfig>,

    /// Metrics collector
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// State with an empty model slot
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            model_slot: Arc::new(ModelSlot::new()),
            config: Arc::new(config),
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// State with `model` already installed
    pub fn with_model(config: ServiceConfig, model: QaModel) -> Self {
        let state = Self::new(config);
        state.model_slot.install(Arc::new(model));
        state
    }
}
