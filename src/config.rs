//! Configuration management for promdict
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::catalog::RetryPolicy;
use crate::error::{AppError, AppResult};
use crate::naming::{self, LabelEscaping};
use crate::registry::{DEFAULT_ERROR_METRIC_NAME, Enumeration, MetricsOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on the flush interval
pub const MAX_SYNC_INTERVAL_MS: u64 = 60_000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Exposition server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9145
}

/// Shared store sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Maximum number of entries
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Evict least-recently-used entries when full instead of failing writes
    #[serde(default = "default_evict")]
    pub evict: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            evict: default_evict(),
        }
    }
}

fn default_capacity() -> usize {
    10_000
}

fn default_evict() -> bool {
    true
}

/// Metric registry options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_error_metric_name")]
    pub error_metric_name: String,
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    #[serde(default)]
    pub label_escaping: LabelEscaping,
    #[serde(default)]
    pub enumeration: Enumeration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            error_metric_name: default_error_metric_name(),
            sync_interval_ms: default_sync_interval_ms(),
            label_escaping: LabelEscaping::default(),
            enumeration: Enumeration::default(),
        }
    }
}

fn default_error_metric_name() -> String {
    DEFAULT_ERROR_METRIC_NAME.to_string()
}

fn default_sync_interval_ms() -> u64 {
    1000
}

/// Key catalog slot-claiming budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_max_add_attempts")]
    pub max_add_attempts: usize,
    /// Base pause between attempts; 0 yields instead of sleeping
    #[serde(default)]
    pub add_backoff_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_add_attempts: default_max_add_attempts(),
            add_backoff_ms: 0,
        }
    }
}

fn default_max_add_attempts() -> usize {
    crate::catalog::DEFAULT_MAX_ATTEMPTS
}

/// Number of worker registries sharing the store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> AppResult<()> {
        if self.store.capacity == 0 {
            return Err(AppError::Config(
                "store.capacity must be greater than 0".to_string(),
            ));
        }

        if self.metrics.sync_interval_ms == 0 || self.metrics.sync_interval_ms > MAX_SYNC_INTERVAL_MS {
            return Err(AppError::Config(format!(
                "metrics.sync_interval_ms must be between 1 and {}, got {}",
                MAX_SYNC_INTERVAL_MS, self.metrics.sync_interval_ms
            )));
        }

        if !naming::is_valid_metric_name(&self.metrics.error_metric_name) {
            return Err(AppError::Config(format!(
                "metrics.error_metric_name '{}' is not a valid metric name",
                self.metrics.error_metric_name
            )));
        }

        // An empty prefix is fine; a non-empty one must start a valid name on its own
        if !self.metrics.prefix.is_empty() && !naming::is_valid_metric_name(&self.metrics.prefix) {
            return Err(AppError::Config(format!(
                "metrics.prefix '{}' must itself be a valid metric name",
                self.metrics.prefix
            )));
        }

        self.retry_policy()?;

        if self.workers.count == 0 {
            return Err(AppError::Config(
                "workers.count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn retry_policy(&self) -> AppResult<RetryPolicy> {
        RetryPolicy::new(
            self.catalog.max_add_attempts,
            Duration::from_millis(self.catalog.add_backoff_ms),
        )
        .map_err(|reason| AppError::Config(format!("catalog.{}", reason)))
    }

    /// Registry options described by `[metrics]` and `[catalog]`
    pub fn metrics_options(&self) -> AppResult<MetricsOptions> {
        Ok(MetricsOptions {
            prefix: self.metrics.prefix.clone(),
            error_metric_name: self.metrics.error_metric_name.clone(),
            sync_interval: Duration::from_millis(self.metrics.sync_interval_ms),
            label_escaping: self.metrics.label_escaping,
            enumeration: self.metrics.enumeration,
            retry: self.retry_policy()?,
        })
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 9145

[store]
capacity = 2048
evict = false

[metrics]
prefix = "app_"
error_metric_name = "app_metric_errors_total"
sync_interval_ms = 250
label_escaping = "escape"
enumeration = "native"

[catalog]
max_add_attempts = 10
add_backoff_ms = 2

[workers]
count = 8

[observability]
log_level = "debug"
"#;

    #[test]
    fn test_config_from_str_parses_all_sections() {
        let config = Config::from_str(TEST_CONFIG).expect("should parse config");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9145);
        assert_eq!(config.store.capacity, 2048);
        assert!(!config.store.evict);
        assert_eq!(config.metrics.prefix, "app_");
        assert_eq!(config.metrics.sync_interval_ms, 250);
        assert_eq!(config.metrics.label_escaping, LabelEscaping::Escape);
        assert_eq!(config.metrics.enumeration, Enumeration::Native);
        assert_eq!(config.catalog.max_add_attempts, 10);
        assert_eq!(config.workers.count, 8);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").expect("defaults should be valid");
        assert_eq!(config.server.port, 9145);
        assert_eq!(config.store.capacity, 10_000);
        assert!(config.store.evict);
        assert_eq!(config.metrics.error_metric_name, DEFAULT_ERROR_METRIC_NAME);
        assert_eq!(config.metrics.sync_interval_ms, 1000);
        assert_eq!(config.metrics.label_escaping, LabelEscaping::Strip);
        assert_eq!(config.metrics.enumeration, Enumeration::Catalog);
        assert_eq!(config.catalog.max_add_attempts, 100);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_metrics_options_from_config() {
        let config = Config::from_str(TEST_CONFIG).expect("should parse config");
        let options = config.metrics_options().expect("options should build");
        assert_eq!(options.prefix, "app_");
        assert_eq!(options.error_metric_name, "app_metric_errors_total");
        assert_eq!(options.sync_interval, Duration::from_millis(250));
        assert_eq!(options.retry.max_attempts(), 10);
        assert_eq!(options.retry.backoff(), Duration::from_millis(2));
    }

    #[test]
    fn test_validation_zero_capacity_fails() {
        let result = Config::from_str("[store]\ncapacity = 0\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("store.capacity"));
    }

    #[test]
    fn test_validation_sync_interval_bounds() {
        assert!(Config::from_str("[metrics]\nsync_interval_ms = 0\n").is_err());
        assert!(Config::from_str("[metrics]\nsync_interval_ms = 60001\n").is_err());
        assert!(Config::from_str("[metrics]\nsync_interval_ms = 60000\n").is_ok());
        assert!(Config::from_str("[metrics]\nsync_interval_ms = 1\n").is_ok());
    }

    #[test]
    fn test_validation_bad_error_metric_name_fails() {
        let err = Config::from_str("[metrics]\nerror_metric_name = \"bad name\"\n").unwrap_err();
        assert!(err.to_string().contains("error_metric_name"));
    }

    #[test]
    fn test_validation_bad_prefix_fails() {
        assert!(Config::from_str("[metrics]\nprefix = \"1x_\"\n").is_err());
        assert!(Config::from_str("[metrics]\nprefix = \"ok_\"\n").is_ok());
    }

    #[test]
    fn test_validation_zero_attempts_fails() {
        let err = Config::from_str("[catalog]\nmax_add_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validation_zero_workers_fails() {
        assert!(Config::from_str("[workers]\ncount = 0\n").is_err());
    }

    #[test]
    fn test_unknown_label_escaping_is_a_parse_error() {
        let err = Config::from_str("[metrics]\nlabel_escaping = \"bogus\"\n").unwrap_err();
        assert!(matches!(err, AppError::ConfigParseFailed { .. }));
    }
}
