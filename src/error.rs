//! Error types for promdict
//!
//! Store, catalog and metric errors are recovered inside the library. Only
//! `AppError` reaches the binary, and it implements `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures reported by a [`SharedStore`](crate::store::SharedStore) primitive
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// CAS `add` found the key already present
    #[error("exists")]
    Exists,

    /// `incr` without an initial value found no key
    #[error("not found")]
    NotFound,

    /// The store is full and eviction is disabled
    #[error("no memory")]
    NoMemory,

    /// `incr` targeted a key holding a non-numeric value
    #[error("not a number")]
    NotNumeric,

    /// A lease lock could not be acquired within its retry budget
    #[error("timeout")]
    Timeout,

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Convenience alias for store primitive results
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the replicated key catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("failed to add key '{key}' to the catalog after {attempts} attempts")]
    RetriesExhausted { key: String, attempts: usize },

    #[error("store error while cataloguing '{key}': {source}")]
    Store { key: String, source: StoreError },

    #[error("failed to acquire catalog lock: {0}")]
    Lock(StoreError),
}

/// Validation and runtime failures of metric registration and updates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),

    #[error("invalid label name '{label}' in metric '{metric}'")]
    InvalidLabelName { metric: String, label: String },

    #[error("label name 'le' is reserved for histogram '{0}'")]
    ReservedLabel(String),

    #[error("metric '{0}' is already registered")]
    DuplicateMetric(String),

    #[error("wrong number of labels for '{metric}': expected {expected}, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("counter '{metric}' cannot be incremented by negative value {value}")]
    NegativeIncrement { metric: String, value: f64 },

    #[error("invalid value {value} for '{metric}'")]
    InvalidValue { metric: String, value: f64 },

    #[error("invalid bucket boundaries for '{metric}': {reason}")]
    InvalidBucket { metric: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Process-level error type for the promdict binary
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Metric(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
