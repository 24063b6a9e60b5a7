//! HTTP request handlers for the promdict demo server

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::{record_requests, track_connections};
use crate::worker::Worker;
use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower_http::trace::TraceLayer;

pub mod demo;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    workers: Arc<[Worker]>,
    next_worker: Arc<AtomicUsize>,
}

impl AppState {
    /// Create a new AppState serving requests on `workers`
    pub fn new(config: Config, workers: Vec<Worker>) -> AppResult<Self> {
        if workers.is_empty() {
            return Err(AppError::Config(
                "at least one worker is required".to_string(),
            ));
        }
        Ok(Self {
            config: Arc::new(config),
            workers: workers.into(),
            next_worker: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Worker with the given id
    pub fn worker(&self, id: usize) -> &Worker {
        &self.workers[id % self.workers.len()]
    }

    /// Pick the worker for the next request, round-robin
    pub fn next_worker(&self) -> &Worker {
        let n = self.next_worker.fetch_add(1, Ordering::Relaxed);
        self.worker(n)
    }
}

/// Build the demo server's router
///
/// Every request is assigned a worker and counted in `connections`; only the
/// `/fast`, `/slow` and `/error` routes are recorded in `requests_total` and
/// `request_duration_seconds`.
pub fn router(state: AppState) -> Router {
    let instrumented = Router::new()
        .route("/fast", get(demo::fast))
        .route("/slow", get(demo::slow))
        .route("/error", get(demo::error))
        .route_layer(from_fn_with_state(state.clone(), record_requests));

    Router::new()
        .route("/metrics", get(metrics::handler))
        .route("/health", get(health::handler))
        .route("/set_gauge", get(demo::set_gauge))
        .route("/reset_gauge", get(demo::reset_gauge))
        .merge(instrumented)
        .layer(from_fn_with_state(state.clone(), track_connections))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
