//! Replicated key catalog
//!
//! Lets a worker enumerate every live canonical key without scanning the
//! shared store. Keys are appended to numbered slots claimed with CAS `add`;
//! each worker keeps a local replica and absorbs only the slots it has not
//! seen yet. A shared deletion counter acts as a version number: when it
//! moves, the replica re-reads every slot once.
//!
//! Store layout:
//!
//! ```text
//! __ngx_prom__key_count     highest claimed slot
//! __ngx_prom__delete_count  number of removals so far
//! __ngx_prom__key_<N>       canonical key held by slot N (N >= 1)
//! ```

use crate::error::{CatalogError, StoreError};
use crate::store::{SharedStore, StoreLock, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::RuntimeFlavor;

const INTERNAL_PREFIX: &str = "__ngx_prom__";
const KEY_PREFIX: &str = "__ngx_prom__key_";
const KEY_COUNT: &str = "__ngx_prom__key_count";
const DELETE_COUNT: &str = "__ngx_prom__delete_count";
const LOCK_KEY: &str = "__ngx_prom__catalog_lock";

/// Whether `key` belongs to the catalog's own bookkeeping
pub fn is_internal(key: &str) -> bool {
    key.starts_with(INTERNAL_PREFIX)
}

/// Shared number of catalog removals so far
///
/// A single store read. A replica whose [`KeyCatalog::deleted`] differs has
/// entries that may have been removed by another worker.
pub fn shared_delete_count(store: &dyn SharedStore) -> Result<u64, StoreError> {
    read_counter(store, DELETE_COUNT)
}

/// Consecutive collisions on an unchanged slot count before probing past it
const STALL_ATTEMPTS: usize = 3;

/// Default number of CAS attempts per key
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;
/// Maximum pause between attempts
pub const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Bounded retry budget with exponential backoff
///
/// A zero base backoff yields the thread between attempts instead of sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    /// Create a retry policy
    ///
    /// # Errors
    /// Returns an error if `max_attempts` is 0 (at least 1 attempt is required)
    pub fn new(max_attempts: usize, backoff: Duration) -> Result<Self, &'static str> {
        if max_attempts == 0 {
            return Err("max_attempts must be at least 1");
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Pause before attempt `attempt + 1`: `backoff * 2^(attempt-1)`, capped at [`MAX_BACKOFF`]
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = (attempt as u32).saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(MAX_BACKOFF)
    }

    /// Yield or sleep after a failed attempt
    pub fn pause(&self, attempt: usize) {
        pause_for(self.delay(attempt));
    }
}

/// Yield for a zero `delay`, otherwise sleep
///
/// On a multi-threaded tokio runtime the sleep runs under `block_in_place`
/// so the other tasks of the worker thread move elsewhere meanwhile.
pub(crate) fn pause_for(delay: Duration) {
    if delay.is_zero() {
        std::thread::yield_now();
        return;
    }
    let on_multi_thread_runtime = tokio::runtime::Handle::try_current()
        .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
    if on_multi_thread_runtime {
        tokio::task::block_in_place(|| std::thread::sleep(delay));
    } else {
        std::thread::sleep(delay);
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

/// What a successful [`KeyCatalog::add`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Keys that claimed a new slot
    pub added: usize,
    /// Slot writes that forced the store to evict another entry
    pub evictions: usize,
}

/// One worker's replica of the key catalog
pub struct KeyCatalog {
    store: Arc<dyn SharedStore>,
    keys: BTreeMap<u64, String>,
    index: HashMap<String, u64>,
    last: u64,
    deleted: u64,
    full_resyncs: u64,
    retry: RetryPolicy,
    lock: StoreLock,
}

fn slot_key(slot: u64) -> String {
    format!("{}{}", KEY_PREFIX, slot)
}

fn read_counter(store: &dyn SharedStore, key: &str) -> Result<u64, StoreError> {
    Ok(store
        .get(key)?
        .and_then(|value| value.as_number())
        .map_or(0, |n| n.max(0.0) as u64))
}

impl KeyCatalog {
    pub fn new(store: Arc<dyn SharedStore>, retry: RetryPolicy) -> Self {
        let lock = StoreLock::new(Arc::clone(&store), LOCK_KEY);
        Self {
            store,
            keys: BTreeMap::new(),
            index: HashMap::new(),
            last: 0,
            deleted: 0,
            full_resyncs: 0,
            retry,
            lock,
        }
    }

    /// Bound how long a batch `add` waits for the catalog lock
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock = self.lock.with_wait(wait);
        self
    }

    /// Highest slot this replica has absorbed
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Deletion count this replica has absorbed
    pub fn deleted(&self) -> u64 {
        self.deleted
    }

    /// Number of full resyncs performed so far
    ///
    /// Changes whenever keys may have disappeared from the replica.
    pub fn full_resyncs(&self) -> u64 {
        self.full_resyncs
    }

    /// Whether `key` is present in the local replica (no store access)
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Local replica in slot order, deleted slots omitted
    pub fn entries(&self) -> impl Iterator<Item = (u64, &str)> {
        self.keys.iter().map(|(slot, key)| (*slot, key.as_str()))
    }

    /// Bring the replica up to date and return the shared slot count
    pub fn sync(&mut self) -> Result<u64, StoreError> {
        let delete_count = read_counter(self.store.as_ref(), DELETE_COUNT)?;
        let key_count = read_counter(self.store.as_ref(), KEY_COUNT)?;

        if delete_count != self.deleted {
            tracing::debug!(
                delete_count,
                local_deleted = self.deleted,
                key_count,
                "Catalog deletions detected, running full resync"
            );
            self.sync_range(1, key_count)?;
            self.deleted = delete_count;
            self.full_resyncs += 1;
        } else if key_count > self.last {
            self.sync_range(self.last + 1, key_count)?;
        }
        Ok(key_count)
    }

    fn sync_range(&mut self, first: u64, last: u64) -> Result<(), StoreError> {
        for slot in first..=last {
            let stored = self.store.get(&slot_key(slot))?;
            match stored.as_ref().and_then(Value::as_text) {
                Some(key) => {
                    if self.keys.get(&slot).is_some_and(|k| k == key) {
                        continue;
                    }
                    self.drop_slot(slot);
                    self.keys.insert(slot, key.to_string());
                    self.index.insert(key.to_string(), slot);
                }
                None => self.drop_slot(slot),
            }
        }
        // Slots past the shared count cannot exist
        let stale: Vec<u64> = self.keys.range(last + 1..).map(|(slot, _)| *slot).collect();
        for slot in stale {
            self.drop_slot(slot);
        }
        self.last = last;
        Ok(())
    }

    fn drop_slot(&mut self, slot: u64) {
        if let Some(old) = self.keys.remove(&slot)
            && self.index.get(&old) == Some(&slot)
        {
            self.index.remove(&old);
        }
    }

    /// Register keys, claiming a new slot for each one not yet catalogued
    ///
    /// Adding a key that is already present is a no-op. Batches with more
    /// than one new key run under the catalog lock so they land together.
    ///
    /// # Errors
    ///
    /// `RetriesExhausted` when other workers keep winning the next slot,
    /// `Store` on any store failure (e.g. no memory), `Lock` if the batch lock
    /// cannot be acquired. Keys added before the failure stay added.
    pub fn add<K: AsRef<str>>(&mut self, keys: &[K]) -> Result<AddOutcome, CatalogError> {
        self.sync().map_err(|source| CatalogError::Store {
            key: KEY_COUNT.to_string(),
            source,
        })?;

        let missing: Vec<&str> = keys
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| !self.index.contains_key(*key))
            .collect();
        if missing.is_empty() {
            return Ok(AddOutcome::default());
        }

        let lock = self.lock.clone();
        let _guard = if missing.len() > 1 {
            Some(lock.acquire().map_err(CatalogError::Lock)?)
        } else {
            None
        };

        let mut outcome = AddOutcome::default();
        for key in missing {
            if self.add_one(key)? {
                outcome.evictions += 1;
            }
            outcome.added += 1;
        }
        Ok(outcome)
    }

    /// Claim a slot for one key, returning whether the write forced an eviction
    ///
    /// Normally the next slot is `key_count + 1`. When that slot stays taken
    /// while the count does not move, the claimer that filled it never bumped
    /// the count (or the count was evicted), so later attempts look further
    /// ahead, doubling the distance each time.
    fn add_one(&mut self, key: &str) -> Result<bool, CatalogError> {
        let store_err = |source: StoreError| CatalogError::Store {
            key: key.to_string(),
            source,
        };

        let mut previous_count = None;
        let mut stalled: usize = 0;
        for attempt in 1..=self.retry.max_attempts() {
            let count = self.sync().map_err(store_err)?;
            if self.index.contains_key(key) {
                return Ok(false);
            }

            if previous_count == Some(count) {
                stalled += 1;
            } else {
                stalled = 0;
            }
            previous_count = Some(count);

            let skip = match stalled.checked_sub(STALL_ATTEMPTS) {
                Some(extra) => 1u64 << extra.min(32),
                None => 0,
            };
            let slot = count.max(self.last) + 1 + skip;
            match self
                .store
                .add(&slot_key(slot), Value::Text(key.to_string()), None)
            {
                Ok(stored) => {
                    let bumped = self.raise_key_count(slot).map_err(store_err)?;
                    self.keys.insert(slot, key.to_string());
                    self.index.insert(key.to_string(), slot);
                    tracing::debug!(key = %key, slot, "Catalogued new key");
                    return Ok(stored.forcible || bumped);
                }
                Err(StoreError::Exists) => {
                    tracing::debug!(key = %key, slot, attempt, "Catalog slot taken, retrying");
                    self.retry.pause(attempt);
                }
                Err(source) => return Err(store_err(source)),
            }
        }

        Err(CatalogError::RetriesExhausted {
            key: key.to_string(),
            attempts: self.retry.max_attempts(),
        })
    }

    /// Bump the shared slot count so that it covers `slot`
    ///
    /// The count only ever grows; overshooting leaves empty slots, which
    /// read as holes.
    fn raise_key_count(&self, slot: u64) -> Result<bool, StoreError> {
        let (count, stored) = self.store.incr(KEY_COUNT, 1.0, Some(0.0))?;
        let mut forcible = stored.forcible;
        let count = count.max(0.0) as u64;
        if count < slot {
            let (_, stored) = self
                .store
                .incr(KEY_COUNT, (slot - count) as f64, Some(0.0))?;
            forcible |= stored.forcible;
        }
        Ok(forcible)
    }

    /// Remove a key from the catalog
    ///
    /// The key must be known to this replica; unknown keys are logged and
    /// ignored. Bumps the shared deletion count so every other replica
    /// resyncs fully on its next `sync()`.
    pub fn remove(&mut self, key: &str) -> Result<(), CatalogError> {
        let Some(slot) = self.index.remove(key) else {
            tracing::warn!(key = %key, "Trying to remove a key missing from the catalog");
            return Ok(());
        };
        self.keys.remove(&slot);

        let store_err = |source: StoreError| CatalogError::Store {
            key: key.to_string(),
            source,
        };
        self.store.delete(&slot_key(slot)).map_err(store_err)?;
        let (count, _) = self
            .store
            .incr(DELETE_COUNT, 1.0, Some(0.0))
            .map_err(store_err)?;
        // Absorb our own deletion unless another worker deleted concurrently
        if count as u64 == self.deleted + 1 {
            self.deleted += 1;
        }
        Ok(())
    }

    /// Sync, then return every catalogued key in slot order
    pub fn list(&mut self) -> Result<Vec<String>, StoreError> {
        self.sync()?;
        Ok(self.keys.values().cloned().collect())
    }
}
