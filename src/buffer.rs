//! Write-coalescing counter buffer
//!
//! The hot path only adds to a process-local map. A periodic flush applies
//! each accumulated delta to the shared store with one atomic increment.
//!
//! Flushing is best effort and at most once: a key whose store update fails
//! is dropped from the buffer along with its delta, and the failure is
//! counted. Pending keys are applied in byte order, which for histogram
//! series is bucket-ascending, then `Inf`, then `_count`, then `_sum`.
//!
//! Creating a key is not atomic across workers. `incr` without an initial
//! value reports "not found", and the key is then initialised with `set`.
//! Two workers that both miss on the same fresh key both `set`, and the
//! later write replaces the earlier one, so the counter can under-count by
//! one initial delta.

use crate::error::StoreError;
use crate::store::{SharedStore, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    delta: f64,
    ttl: Option<Duration>,
}

/// Result of one flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Keys whose delta reached the store
    pub applied: usize,
    /// Keys whose delta was lost
    pub failed: usize,
    /// Store writes that evicted another entry
    pub evictions: usize,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.evictions == 0
    }
}

/// Per-worker pending deltas
#[derive(Debug, Default)]
pub struct CounterBuffer {
    pending: Mutex<BTreeMap<String, Pending>>,
    errors: AtomicU64,
}

impl CounterBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the map cannot leave a half-applied delta, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `delta` to the pending total of `key`
    ///
    /// Never touches the store. A TTL, when given, replaces any earlier one
    /// and is applied on flush.
    pub fn incr(&self, key: &str, delta: f64, ttl: Option<Duration>) {
        let mut pending = self.lock();
        match pending.get_mut(key) {
            Some(entry) => {
                entry.delta += delta;
                if ttl.is_some() {
                    entry.ttl = ttl;
                }
            }
            None => {
                pending.insert(key.to_string(), Pending { delta, ttl });
            }
        }
    }

    /// Pending delta for `key`, if any
    pub fn pending(&self, key: &str) -> Option<f64> {
        self.lock().get(key).map(|entry| entry.delta)
    }

    /// Number of keys with a pending delta
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of keys whose delta was lost by a failed flush
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Apply every pending delta to `store` and empty the buffer
    ///
    /// Increments arriving during the flush are kept for the next one.
    pub fn flush(&self, store: &dyn SharedStore) -> FlushReport {
        let drained = std::mem::take(&mut *self.lock());
        let mut report = FlushReport::default();

        for (key, entry) in drained {
            match apply(store, &key, entry) {
                Ok(forcible) => {
                    report.applied += 1;
                    if forcible {
                        tracing::warn!(key = %key, "Flushing counter evicted another store entry");
                        report.evictions += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        key = %key,
                        delta = entry.delta,
                        error = %e,
                        "Failed to flush counter delta; delta dropped"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.failed > 0 {
            self.errors
                .fetch_add(report.failed as u64, Ordering::Relaxed);
        }
        report
    }
}

/// Apply one delta, returning whether the write forced an eviction
fn apply(store: &dyn SharedStore, key: &str, entry: Pending) -> Result<bool, StoreError> {
    match store.incr(key, entry.delta, None) {
        Ok((_, stored)) => {
            if let Some(ttl) = entry.ttl {
                store.expire(key, ttl)?;
            }
            Ok(stored.forcible)
        }
        Err(StoreError::NotFound) => {
            let stored = store.set(key, Value::Number(entry.delta), entry.ttl)?;
            Ok(stored.forcible)
        }
        Err(e) => Err(e),
    }
}
