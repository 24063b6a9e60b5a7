//! Prometheus metrics endpoint
//!
//! Exposes metrics in Prometheus text format for scraping.

use axum::{
    Extension,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};

use crate::exporter;
use crate::handlers::AppState;
use crate::middleware::WorkerId;

/// Metrics handler for Prometheus scraping
///
/// Renders the exposition from the worker serving the request. Unreadable
/// series are skipped and counted, so this always answers `200 OK`.
///
/// # Example
///
/// ```bash
/// curl http://localhost:9145/metrics
/// # HELP requests_total Number of HTTP requests
/// # TYPE requests_total counter
/// requests_total{host="localhost",path="/fast",status="200"} 42
/// ```
pub async fn handler(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerId>,
) -> impl IntoResponse {
    let body = exporter::render(state.worker(worker.0).registry());
    (StatusCode::OK, [(CONTENT_TYPE, exporter::CONTENT_TYPE)], body)
}
