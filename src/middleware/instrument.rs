//! Request instrumentation middleware
//!
//! Assigns each incoming request to a worker and makes the assignment
//! available to handlers via Axum extensions, then records the request in
//! that worker's metrics.

use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Host label used when a request carries no `Host` header
pub const DEFAULT_HOST: &str = "localhost";

/// Worker assigned to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId(pub usize);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Assign a worker and count the request in `connections{state="writing"}`
/// while it is being served
pub async fn track_connections(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let worker = state.next_worker().clone();
    let worker_id = WorkerId(worker.id());

    tracing::debug!(
        worker = %worker_id,
        method = %request.method(),
        uri = %request.uri(),
        "Incoming request"
    );

    request.extensions_mut().insert(worker_id);
    worker.connections().inc(1.0, &["writing"]);
    let response = next.run(request).await;
    worker.connections().inc(-1.0, &["writing"]);

    response
}

/// Record `requests_total` and `request_duration_seconds` for the request
pub async fn record_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let worker_id = request
        .extensions()
        .get::<WorkerId>()
        .copied()
        .unwrap_or(WorkerId(0));
    let path = request.uri().path().to_string();
    let host = host_label(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    state.worker(worker_id.0).record_request(
        &host,
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

/// `Host` header without the port
fn host_label(request: &Request) -> String {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| host.rsplit_once(':').map_or(host, |(name, _)| name))
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_HOST)
        .to_string()
}
