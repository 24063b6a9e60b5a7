//! Metric registry and update handles
//!
//! Each worker owns one `MetricRegistry`. Registries of different workers
//! share nothing but the [`SharedStore`]; they meet there through the key
//! catalog and the stored sample values.
//!
//! Counters and histograms are buffered per worker and reach the store on
//! flush. Gauges are written straight to the store so that an overwrite is
//! visible to every worker immediately.
//!
//! Update operations never fail the caller. A rejected update is logged and
//! counted in the internal error metric, and the call has no other effect.

use crate::buffer::{CounterBuffer, FlushReport};
use crate::catalog::{self, KeyCatalog, RetryPolicy};
use crate::error::{MetricError, StoreError};
use crate::lookup::{LookupCache, SeriesLayout};
use crate::naming::{self, BucketFormat, LE_LABEL, LabelEscaping};
use crate::store::{SharedStore, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Name of the internal error counter unless configured otherwise
pub const DEFAULT_ERROR_METRIC_NAME: &str = "nginx_metric_errors_total";
/// HELP text of the internal error counter
pub const ERROR_METRIC_HELP: &str = "Number of nginx-lua-prometheus errors";
/// Default flush and catalog sync period
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Where the exporter gets the list of live keys from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Enumeration {
    /// The replicated key catalog
    #[default]
    Catalog,
    /// The store's own `keys()`, if the store says it is cheap
    Native,
}

/// Metric type as written on the `# TYPE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime options of a registry
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOptions {
    /// Prepended to every registered metric name except the error metric
    pub prefix: String,
    pub error_metric_name: String,
    /// Flush period; also how long `del` and `reset` wait before deleting
    pub sync_interval: Duration,
    pub label_escaping: LabelEscaping,
    pub enumeration: Enumeration,
    /// Budget for claiming catalog slots
    pub retry: RetryPolicy,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            error_metric_name: DEFAULT_ERROR_METRIC_NAME.to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            label_escaping: LabelEscaping::default(),
            enumeration: Enumeration::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Definition of one metric
///
/// ```
/// use promdict::registry::MetricDef;
/// use std::time::Duration;
///
/// let def = MetricDef::new("request_duration_seconds")
///     .help("Request latency")
///     .labels(&["path"])
///     .buckets(&[0.1, 0.5, 1.0])
///     .ttl(Duration::from_secs(300));
/// assert_eq!(def.name(), "request_duration_seconds");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDef {
    name: String,
    help: String,
    label_names: Vec<String>,
    buckets: Option<Vec<f64>>,
    ttl: Option<Duration>,
}

impl MetricDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn labels(mut self, names: &[&str]) -> Self {
        self.label_names = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Histogram bucket boundaries, ascending
    pub fn buckets(mut self, boundaries: &[f64]) -> Self {
        self.buckets = Some(boundaries.to_vec());
        self
    }

    /// Expiry applied to every series of the metric on each update
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Exposition metadata shared by every series name of one metric
#[derive(Debug)]
pub(crate) struct Family {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
}

#[derive(Debug)]
struct Metric {
    name: String,
    /// Names of every series family the metric writes (`x`, or `x_bucket`, `x_count`, `x_sum`)
    series_names: Vec<String>,
    layout: SeriesLayout,
    lookup: Mutex<LookupCache>,
    ttl: Option<Duration>,
}

impl Metric {
    /// Whether `key` is one of this metric's series
    fn owns(&self, key: &str) -> bool {
        self.series_names.iter().any(|name| {
            key.strip_prefix(name.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('{'))
        })
    }

    fn lookup(&self) -> MutexGuard<'_, LookupCache> {
        self.lookup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner {
    store: Arc<dyn SharedStore>,
    options: MetricsOptions,
    catalog: Mutex<KeyCatalog>,
    /// Catalog full-resync count, read by lookups without taking the catalog lock
    generation: AtomicU64,
    /// Deletions the catalog replica has absorbed
    deleted: AtomicU64,
    buffer: CounterBuffer,
    families: RwLock<HashMap<String, Arc<Family>>>,
    native_enumeration: bool,
}

/// One worker's metric registry
///
/// Cheap to clone; clones share the same worker state.
#[derive(Clone)]
pub struct MetricRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("options", &self.inner.options)
            .field("pending", &self.inner.buffer.len())
            .finish_non_exhaustive()
    }
}

impl MetricRegistry {
    /// Create a worker registry over `store` and bootstrap the error metric
    pub fn new(store: Arc<dyn SharedStore>, options: MetricsOptions) -> Self {
        let native_enumeration =
            options.enumeration == Enumeration::Native && store.cheap_enumeration();
        if options.enumeration == Enumeration::Native && !native_enumeration {
            tracing::warn!(
                "Native key enumeration requested but the store does not support it cheaply; \
                using the key catalog"
            );
        }

        let catalog = KeyCatalog::new(Arc::clone(&store), options.retry);
        let registry = Self {
            inner: Arc::new(Inner {
                store,
                options,
                catalog: Mutex::new(catalog),
                generation: AtomicU64::new(0),
                deleted: AtomicU64::new(0),
                buffer: CounterBuffer::new(),
                families: RwLock::new(HashMap::new()),
                native_enumeration,
            }),
        };
        registry.bootstrap_error_metric();
        registry
    }

    pub fn options(&self) -> &MetricsOptions {
        &self.inner.options
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.inner.store
    }

    pub fn error_metric_name(&self) -> &str {
        &self.inner.options.error_metric_name
    }

    /// Current value of the internal error counter in the shared store
    pub fn error_count(&self) -> f64 {
        self.inner
            .store
            .get(self.error_metric_name())
            .ok()
            .flatten()
            .and_then(|value| value.as_number())
            .unwrap_or(0.0)
    }

    /// Keys waiting in this worker's buffer
    pub fn pending(&self) -> usize {
        self.inner.buffer.len()
    }

    fn bootstrap_error_metric(&self) {
        let name = self.error_metric_name().to_string();
        if !naming::is_valid_metric_name(&name) {
            tracing::error!(metric = %name, "Invalid error metric name; internal errors will not be exported");
            return;
        }

        self.families_mut().insert(
            name.clone(),
            Arc::new(Family {
                name: name.clone(),
                kind: MetricKind::Counter,
                help: ERROR_METRIC_HELP.to_string(),
            }),
        );

        match self.inner.store.add(&name, Value::Number(0.0), None) {
            Ok(_) | Err(StoreError::Exists) => {}
            Err(e) => {
                tracing::error!(metric = %name, error = %e, "Failed to initialise error metric");
            }
        }
        if let Err(e) = self.with_catalog(|catalog| catalog.add(&[name.as_str()])) {
            tracing::error!(metric = %name, error = %e, "Failed to catalogue error metric");
        }
    }

    fn families_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Family>>> {
        self.inner
            .families
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Family a series name belongs to, if registered with this worker
    pub(crate) fn family(&self, series_name: &str) -> Option<Arc<Family>> {
        self.inner
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(series_name)
            .cloned()
    }

    /// Add `n` to the internal error counter
    pub(crate) fn count_errors(&self, n: u64) {
        if n == 0 {
            return;
        }
        if let Err(e) = self
            .inner
            .store
            .incr(self.error_metric_name(), n as f64, Some(0.0))
        {
            tracing::error!(error = %e, "Failed to increment internal error metric");
        }
    }

    fn record_error(&self, err: &MetricError) {
        tracing::error!(error = %err, "Metric operation failed");
        self.count_errors(1);
    }

    fn note_eviction(&self, key: &str) {
        tracing::warn!(key = %key, "Store evicted an entry to make room; values may have been lost");
        self.count_errors(1);
    }

    fn with_catalog<R>(&self, f: impl FnOnce(&mut KeyCatalog) -> R) -> R {
        let mut catalog = self
            .inner
            .catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut catalog);
        self.inner
            .generation
            .store(catalog.full_resyncs(), Ordering::Release);
        self.inner
            .deleted
            .store(catalog.deleted(), Ordering::Release);
        result
    }

    /// Register a counter
    ///
    /// # Errors
    ///
    /// Invalid names, reserved or duplicate names. The error is also logged
    /// and counted.
    pub fn counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Counter, MetricError> {
        self.define_counter(MetricDef::new(name).help(help).labels(labels))
    }

    pub fn gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Gauge, MetricError> {
        self.define_gauge(MetricDef::new(name).help(help).labels(labels))
    }

    /// Register a histogram, with the default latency ladder when `buckets` is `None`
    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Option<&[f64]>,
    ) -> Result<Histogram, MetricError> {
        let mut def = MetricDef::new(name).help(help).labels(labels);
        if let Some(boundaries) = buckets {
            def = def.buckets(boundaries);
        }
        self.define_histogram(def)
    }

    pub fn define_counter(&self, def: MetricDef) -> Result<Counter, MetricError> {
        let metric = self.define(MetricKind::Counter, def)?;
        Ok(Counter(Handle::new(self, metric)))
    }

    pub fn define_gauge(&self, def: MetricDef) -> Result<Gauge, MetricError> {
        let metric = self.define(MetricKind::Gauge, def)?;
        Ok(Gauge(Handle::new(self, metric)))
    }

    pub fn define_histogram(&self, def: MetricDef) -> Result<Histogram, MetricError> {
        let metric = self.define(MetricKind::Histogram, def)?;
        Ok(Histogram(Handle::new(self, metric)))
    }

    fn define(&self, kind: MetricKind, def: MetricDef) -> Result<Arc<Metric>, MetricError> {
        let result = self.build_metric(kind, def);
        if let Err(e) = &result {
            self.record_error(e);
        }
        result
    }

    fn build_metric(&self, kind: MetricKind, def: MetricDef) -> Result<Arc<Metric>, MetricError> {
        let name = format!("{}{}", self.inner.options.prefix, def.name);
        if !naming::is_valid_metric_name(&name) {
            return Err(MetricError::InvalidMetricName(name));
        }
        for label in &def.label_names {
            if !naming::is_valid_label_name(label) {
                return Err(MetricError::InvalidLabelName {
                    metric: name,
                    label: label.clone(),
                });
            }
            if kind == MetricKind::Histogram && label == LE_LABEL {
                return Err(MetricError::ReservedLabel(name));
            }
        }

        let escaping = self.inner.options.label_escaping;
        let (layout, series_names) = match kind {
            MetricKind::Histogram => {
                let buckets = def
                    .buckets
                    .unwrap_or_else(|| naming::DEFAULT_BUCKETS.to_vec());
                let format = BucketFormat::new(&buckets).map_err(|reason| {
                    MetricError::InvalidBucket {
                        metric: name.clone(),
                        reason,
                    }
                })?;
                if !buckets.windows(2).all(|pair| pair[0] < pair[1]) {
                    return Err(MetricError::InvalidBucket {
                        metric: name,
                        reason: "boundaries must be strictly ascending".to_string(),
                    });
                }
                let series_names = vec![
                    name.clone(),
                    format!("{}_bucket", name),
                    format!("{}_count", name),
                    format!("{}_sum", name),
                ];
                let layout =
                    SeriesLayout::histogram(&name, def.label_names, buckets, format, escaping);
                (layout, series_names)
            }
            MetricKind::Counter | MetricKind::Gauge => {
                if def.buckets.is_some() {
                    return Err(MetricError::InvalidBucket {
                        metric: name,
                        reason: format!("a {} has no buckets", kind),
                    });
                }
                let layout = SeriesLayout::scalar(&name, def.label_names, escaping);
                (layout, vec![name.clone()])
            }
        };

        let family = Arc::new(Family {
            name: name.clone(),
            kind,
            help: def.help,
        });
        {
            let mut families = self.families_mut();
            if series_names.iter().any(|series| families.contains_key(series)) {
                return Err(MetricError::DuplicateMetric(name));
            }
            for series in &series_names {
                families.insert(series.clone(), Arc::clone(&family));
            }
        }

        tracing::debug!(metric = %name, kind = %kind, "Registered metric");
        Ok(Arc::new(Metric {
            name,
            series_names,
            layout,
            lookup: Mutex::new(LookupCache::new()),
            ttl: def.ttl,
        }))
    }

    /// Resolve a label tuple to keys, cataloguing them on first use
    ///
    /// Cached tuples are only trusted while no other worker has removed
    /// catalog entries since the last sync; otherwise the catalog resyncs and
    /// the caches are rebuilt, so a series deleted elsewhere is catalogued
    /// again instead of being written where no export can find it.
    fn resolve(&self, metric: &Metric, values: &[&str]) -> Result<Arc<[String]>, MetricError> {
        let shared_deleted = catalog::shared_delete_count(self.inner.store.as_ref())?;
        if shared_deleted != self.inner.deleted.load(Ordering::Acquire) {
            self.with_catalog(|catalog| catalog.sync())?;
        }

        let generation = self.inner.generation.load(Ordering::Acquire);
        let mut lookup = metric.lookup();
        if lookup.revalidate(generation) {
            tracing::debug!(metric = %metric.name, "Catalog resynced, dropped cached label lookups");
        }
        lookup.resolve(&metric.layout, values, |keys| {
            let outcome = self.with_catalog(|catalog| catalog.add(keys))?;
            for _ in 0..outcome.evictions {
                self.note_eviction(&metric.name);
            }
            Ok(())
        })
    }

    /// Apply this worker's buffered deltas to the store
    pub fn flush(&self) -> FlushReport {
        let report = self.inner.buffer.flush(self.inner.store.as_ref());
        self.count_errors((report.failed + report.evictions) as u64);
        report
    }

    /// Absorb catalog changes made by other workers
    pub fn sync_catalog(&self) {
        if let Err(e) = self.with_catalog(|catalog| catalog.sync()) {
            tracing::error!(error = %e, "Failed to sync key catalog");
            self.count_errors(1);
        }
    }

    /// Every live key, from the catalog or the store's native enumeration
    pub fn live_keys(&self) -> Result<Vec<String>, StoreError> {
        if self.inner.native_enumeration {
            let mut keys = self.inner.store.keys(0)?;
            keys.retain(|key| !crate::catalog::is_internal(key));
            Ok(keys)
        } else {
            self.with_catalog(|catalog| catalog.list())
        }
    }

    fn forget_keys(&self, keys: &[String]) -> Result<(), MetricError> {
        for key in keys {
            self.inner.store.delete(key)?;
        }
        self.with_catalog(|catalog| -> Result<(), MetricError> {
            catalog.sync()?;
            for key in keys {
                if catalog.contains(key) {
                    catalog.remove(key)?;
                }
            }
            Ok(())
        })
    }

    /// Flush, then give every other worker one interval to flush too
    async fn drain(&self) {
        self.flush();
        tokio::time::sleep(self.inner.options.sync_interval).await;
    }

    async fn delete_series(&self, metric: &Metric, values: &[&str]) -> Result<(), MetricError> {
        metric.layout.check_arity(values)?;
        let keys = metric.layout.keys_for(values);
        self.drain().await;
        self.forget_keys(&keys)?;
        metric.lookup().remove(values);
        Ok(())
    }

    async fn reset_metric(&self, metric: &Metric) -> Result<(), MetricError> {
        self.drain().await;
        let keys: Vec<String> = self
            .live_keys()?
            .into_iter()
            .filter(|key| metric.owns(key))
            .collect();
        self.forget_keys(&keys)?;
        metric.lookup().clear();
        tracing::info!(metric = %metric.name, removed = keys.len(), "Reset metric");
        Ok(())
    }

    /// Flush and sync the catalog every `sync_interval` in a background task
    ///
    /// Returns a handle that stops the task when aborted.
    pub fn spawn_flusher(&self) -> AbortHandle {
        let registry = self.clone();
        let interval = self.inner.options.sync_interval;
        let handle = tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Starting background metric flusher");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let report = registry.flush();
                if !report.is_clean() {
                    tracing::debug!(
                        applied = report.applied,
                        failed = report.failed,
                        evictions = report.evictions,
                        "Flushed metric buffer with errors"
                    );
                }
                registry.sync_catalog();
            }
        });
        let abort = handle.abort_handle();

        tokio::spawn(async move {
            match handle.await {
                Ok(()) => {
                    tracing::error!(
                        "Background metric flusher terminated unexpectedly. \
                        Buffered counters will not reach the store."
                    );
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!("Background metric flusher stopped");
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "Background metric flusher panicked. \
                        Buffered counters will not reach the store."
                    );
                }
            }
        });

        abort
    }
}

#[derive(Debug, Clone)]
struct Handle {
    registry: MetricRegistry,
    metric: Arc<Metric>,
}

impl Handle {
    fn new(registry: &MetricRegistry, metric: Arc<Metric>) -> Self {
        Self {
            registry: registry.clone(),
            metric,
        }
    }

    fn report(&self, result: Result<(), MetricError>) {
        if let Err(e) = result {
            self.registry.record_error(&e);
        }
    }

    async fn del(&self, values: &[&str]) {
        let result = self.registry.delete_series(&self.metric, values).await;
        self.report(result);
    }

    async fn reset(&self) {
        let result = self.registry.reset_metric(&self.metric).await;
        self.report(result);
    }
}

/// Monotonic counter, buffered per worker
#[derive(Debug, Clone)]
pub struct Counter(Handle);

impl Counter {
    pub fn name(&self) -> &str {
        &self.0.metric.name
    }

    /// Add `value` (>= 0) to the series identified by `labels`
    pub fn inc(&self, value: f64, labels: &[&str]) {
        let result = self.try_inc(value, labels);
        self.0.report(result);
    }

    fn try_inc(&self, value: f64, labels: &[&str]) -> Result<(), MetricError> {
        if value.is_nan() {
            return Err(MetricError::InvalidValue {
                metric: self.0.metric.name.clone(),
                value,
            });
        }
        if value < 0.0 {
            return Err(MetricError::NegativeIncrement {
                metric: self.0.metric.name.clone(),
                value,
            });
        }
        let keys = self.0.registry.resolve(&self.0.metric, labels)?;
        self.0
            .registry
            .inner
            .buffer
            .incr(&keys[0], value, self.0.metric.ttl);
        Ok(())
    }

    /// Delete one series after giving all workers a sync interval to flush
    pub async fn del(&self, labels: &[&str]) {
        self.0.del(labels).await;
    }

    /// Delete every series of this counter
    pub async fn reset(&self) {
        self.0.reset().await;
    }
}

/// Gauge, written directly to the store
#[derive(Debug, Clone)]
pub struct Gauge(Handle);

impl Gauge {
    pub fn name(&self) -> &str {
        &self.0.metric.name
    }

    pub fn set(&self, value: f64, labels: &[&str]) {
        let result = self.try_set(value, labels);
        self.0.report(result);
    }

    fn try_set(&self, value: f64, labels: &[&str]) -> Result<(), MetricError> {
        let keys = self.0.registry.resolve(&self.0.metric, labels)?;
        let stored = self.0.registry.inner.store.set(
            &keys[0],
            Value::Number(value),
            self.0.metric.ttl,
        )?;
        if stored.forcible {
            self.0.registry.note_eviction(&keys[0]);
        }
        Ok(())
    }

    /// Add `delta` (may be negative), starting from 0 when the series is absent
    pub fn inc(&self, delta: f64, labels: &[&str]) {
        let result = self.try_inc(delta, labels);
        self.0.report(result);
    }

    fn try_inc(&self, delta: f64, labels: &[&str]) -> Result<(), MetricError> {
        if delta.is_nan() {
            return Err(MetricError::InvalidValue {
                metric: self.0.metric.name.clone(),
                value: delta,
            });
        }
        let keys = self.0.registry.resolve(&self.0.metric, labels)?;
        let store = &self.0.registry.inner.store;
        let (_, stored) = store.incr(&keys[0], delta, Some(0.0))?;
        if let Some(ttl) = self.0.metric.ttl {
            store.expire(&keys[0], ttl)?;
        }
        if stored.forcible {
            self.0.registry.note_eviction(&keys[0]);
        }
        Ok(())
    }

    pub async fn del(&self, labels: &[&str]) {
        self.0.del(labels).await;
    }

    pub async fn reset(&self) {
        self.0.reset().await;
    }
}

/// Histogram with fixed bucket boundaries, buffered per worker
#[derive(Debug, Clone)]
pub struct Histogram(Handle);

impl Histogram {
    pub fn name(&self) -> &str {
        &self.0.metric.name
    }

    pub fn buckets(&self) -> &[f64] {
        self.0.metric.layout.buckets()
    }

    /// Record one observation
    ///
    /// Every bucket key of the series is touched, buckets below `value` with
    /// a zero delta, so the whole series exists after the first observation.
    pub fn observe(&self, value: f64, labels: &[&str]) {
        let result = self.try_observe(value, labels);
        self.0.report(result);
    }

    fn try_observe(&self, value: f64, labels: &[&str]) -> Result<(), MetricError> {
        if value.is_nan() {
            return Err(MetricError::InvalidValue {
                metric: self.0.metric.name.clone(),
                value,
            });
        }
        let keys = self.0.registry.resolve(&self.0.metric, labels)?;
        let buffer = &self.0.registry.inner.buffer;
        let ttl = self.0.metric.ttl;
        let buckets = self.buckets();

        for (key, boundary) in keys.iter().zip(buckets) {
            let hit = if value <= *boundary { 1.0 } else { 0.0 };
            buffer.incr(key, hit, ttl);
        }
        let n = buckets.len();
        buffer.incr(&keys[n], 1.0, ttl);
        buffer.incr(&keys[n + 1], 1.0, ttl);
        buffer.incr(&keys[n + 2], value, ttl);
        Ok(())
    }

    pub async fn reset(&self) {
        self.0.reset().await;
    }
}
