//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Metrics status: "operational" or "degraded"
    pub metrics_status: &'static str,
    /// Internal errors counted by the error metric
    pub metric_errors: f64,
    /// Worker registries sharing the store
    pub workers: usize,
}

/// Health check handler
///
/// Returns 200 OK with health status and metrics status.
///
/// Metrics status is "degraded" once the internal error metric is non-zero,
/// meaning at least one update, flush or export did not take effect.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let metric_errors = state.worker(0).registry().error_count();
    let metrics_status = if metric_errors > 0.0 {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            metrics_status,
            metric_errors,
            workers: state.workers().len(),
        }),
    )
}
