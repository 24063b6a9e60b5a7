//! Instrumented demo routes
//!
//! `/fast`, `/slow` and `/error` generate traffic for `requests_total` and
//! `request_duration_seconds`. `/set_gauge` and `/reset_gauge` drive
//! `reset_test_gauge`.

use axum::{
    Extension,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::WorkerId;

/// Latency added by `/slow`
pub const SLOW_DELAY: Duration = Duration::from_millis(10);

pub async fn fast() -> &'static str {
    "ok"
}

pub async fn slow() -> &'static str {
    tokio::time::sleep(SLOW_DELAY).await;
    "ok"
}

pub async fn error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "error")
}

#[derive(Debug, Deserialize)]
pub struct SetGaugeParams {
    pub labelvalue: String,
    pub metricvalue: f64,
}

/// Set `reset_test_gauge{label=<labelvalue>}` to `metricvalue`
pub async fn set_gauge(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerId>,
    Query(params): Query<SetGaugeParams>,
) -> AppResult<&'static str> {
    if !params.metricvalue.is_finite() {
        return Err(AppError::Validation(format!(
            "metricvalue must be a finite number, got {}",
            params.metricvalue
        )));
    }
    state
        .worker(worker.0)
        .reset_gauge()
        .set(params.metricvalue, &[&params.labelvalue]);
    Ok("ok")
}

/// Delete every series of `reset_test_gauge`
///
/// Answers once the reset is complete, one sync interval after the request.
pub async fn reset_gauge(
    State(state): State<AppState>,
    Extension(worker): Extension<WorkerId>,
) -> &'static str {
    state.worker(worker.0).reset_gauge().reset().await;
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter;
    use crate::handlers::tests::create_test_state;

    #[tokio::test]
    async fn test_error_route_returns_500() {
        let (status, _) = error().await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_set_gauge_rejects_non_finite_value() {
        let state = create_test_state(1);
        let params = SetGaugeParams {
            labelvalue: "client1".to_string(),
            metricvalue: f64::INFINITY,
        };
        let result = set_gauge(State(state), Extension(WorkerId(0)), Query(params)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_then_reset_gauge_across_workers() {
        let state = create_test_state(2);
        let params = SetGaugeParams {
            labelvalue: "client1".to_string(),
            metricvalue: 42.0,
        };
        set_gauge(State(state.clone()), Extension(WorkerId(0)), Query(params))
            .await
            .expect("set should succeed");

        let lines = exporter::collect(state.worker(1).registry());
        assert!(lines.contains(&r#"reset_test_gauge{label="client1"} 42"#.to_string()));

        reset_gauge(State(state.clone()), Extension(WorkerId(1))).await;
        let lines = exporter::collect(state.worker(0).registry());
        assert!(lines.iter().all(|line| !line.contains("reset_test_gauge")));
    }
}
