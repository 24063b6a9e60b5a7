//! Worker contexts
//!
//! A worker is one registry plus the instrumentation metrics the demo server
//! records. Every worker registers the same metrics against the same store,
//! the way each process of a multi-process server would.

use crate::config::{Config, StoreConfig};
use crate::error::{AppError, AppResult, MetricError};
use crate::registry::{Counter, Gauge, Histogram, MetricDef, MetricRegistry, MetricsOptions};
use crate::store::{MemoryStore, SharedStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Bucket boundaries of `request_duration_seconds`
pub const REQUEST_DURATION_BUCKETS: [f64; 15] = [
    0.08,
    0.089991,
    0.1,
    0.2,
    0.75,
    1.0,
    1.5,
    3.123232001,
    5.0,
    15.0,
    120.0,
    350.5,
    1500.0,
    75000.0,
    1500000.0,
];

/// Gauge driven by `/set_gauge` and cleared by `/reset_gauge`
pub const RESET_GAUGE_NAME: &str = "reset_test_gauge";

/// Connection states reported by the `connections` gauge
pub const CONNECTION_STATES: [&str; 3] = ["reading", "waiting", "writing"];

#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    registry: MetricRegistry,
    requests: Counter,
    latency: Histogram,
    connections: Gauge,
    reset_gauge: Gauge,
}

impl Worker {
    /// Create a worker registry and register the instrumentation metrics
    pub fn new(
        id: usize,
        store: Arc<dyn SharedStore>,
        options: MetricsOptions,
    ) -> Result<Self, MetricError> {
        let registry = MetricRegistry::new(store, options);
        let requests = registry.counter(
            "requests_total",
            "Number of HTTP requests",
            &["host", "path", "status"],
        )?;
        let latency = registry.define_histogram(
            MetricDef::new("request_duration_seconds")
                .help("HTTP request latency")
                .labels(&["path"])
                .buckets(&REQUEST_DURATION_BUCKETS),
        )?;
        let connections = registry.gauge("connections", "Number of HTTP connections", &["state"])?;
        let reset_gauge = registry.gauge(RESET_GAUGE_NAME, "Sample gauge for reset test", &["label"])?;

        Ok(Self {
            id,
            registry,
            requests,
            latency,
            connections,
            reset_gauge,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &Gauge {
        &self.connections
    }

    pub fn reset_gauge(&self) -> &Gauge {
        &self.reset_gauge
    }

    /// Record one finished request
    pub fn record_request(&self, host: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.requests.inc(1.0, &[host, path, &status]);
        self.latency.observe(elapsed.as_secs_f64(), &[path]);
    }

    /// Start this worker's background flusher
    pub fn start(&self) -> AbortHandle {
        self.registry.spawn_flusher()
    }
}

/// Build the shared store described by `[store]`
pub fn build_store(config: &StoreConfig) -> Arc<dyn SharedStore> {
    Arc::new(MemoryStore::new(config.capacity).with_eviction(config.evict))
}

/// Create `workers.count` workers over one fresh store
///
/// Connection gauges are zeroed once, by the first worker.
pub fn spawn_workers(config: &Config) -> AppResult<Vec<Worker>> {
    let store = build_store(&config.store);
    let options = config.metrics_options()?;

    let workers = (0..config.workers.count)
        .map(|id| Worker::new(id, Arc::clone(&store), options.clone()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)?;

    if let Some(first) = workers.first() {
        for state in CONNECTION_STATES {
            first.connections.set(0.0, &[state]);
        }
    }

    tracing::info!(
        workers = workers.len(),
        capacity = config.store.capacity,
        "Created worker registries over shared store"
    );
    Ok(workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter;

    #[test]
    fn test_workers_share_one_store() {
        let config: Config = "[workers]\ncount = 3\n".parse().expect("valid config");
        let workers = spawn_workers(&config).expect("workers should start");
        assert_eq!(workers.len(), 3);

        for worker in &workers {
            worker.record_request("h", "/fast", 200, Duration::from_millis(1));
            worker.registry().flush();
        }

        let lines = exporter::collect(workers[0].registry());
        assert!(lines.contains(&r#"requests_total{host="h",path="/fast",status="200"} 3"#.to_string()));
        assert!(lines.contains(&r#"connections{state="writing"} 0"#.to_string()));
    }

    #[test]
    fn test_request_latency_lands_in_first_bucket() {
        let config = Config::default();
        let workers = spawn_workers(&config).expect("workers should start");
        workers[0].record_request("h", "/fast", 200, Duration::from_millis(5));

        let lines = exporter::collect(workers[0].registry());
        assert!(lines.contains(
            &r#"request_duration_seconds_bucket{path="/fast",le="0000000.080000"} 1"#.to_string()
        ));
        assert!(lines.contains(
            &r#"request_duration_seconds_bucket{path="/fast",le="+Inf"} 1"#.to_string()
        ));
        assert!(lines.contains(&r#"request_duration_seconds_count{path="/fast"} 1"#.to_string()));
    }
}
