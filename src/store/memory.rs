//! In-process shared store
//!
//! A fixed-capacity map shared by every worker context in the process. When
//! full it evicts the least recently used entry (reported as `forcible`), or
//! refuses the write with `NoMemory` when eviction is disabled.

use super::{SharedStore, Stored, Value};
use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    last_used: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

impl Inner {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Drop the entry if it has expired, returning whether it is still live
    fn live(&mut self, key: &str, now: Instant) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Make room for one new entry
    fn reserve(&mut self, capacity: usize, evict: bool, now: Instant) -> StoreResult<bool> {
        if self.entries.len() < capacity {
            return Ok(false);
        }

        self.entries.retain(|_, entry| !entry.is_expired(now));
        if self.entries.len() < capacity {
            return Ok(false);
        }

        if !evict || capacity == 0 {
            return Err(StoreError::NoMemory);
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                tracing::debug!(key = %key, "Evicting least recently used entry");
                self.entries.remove(&key);
                Ok(true)
            }
            None => Err(StoreError::NoMemory),
        }
    }

    fn insert(
        &mut self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        capacity: usize,
        evict: bool,
    ) -> StoreResult<Stored> {
        let now = Instant::now();
        let forcible = if self.live(key, now) {
            false
        } else {
            self.reserve(capacity, evict, now)?
        };
        let last_used = self.touch();
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
                last_used,
            },
        );
        Ok(Stored { forcible })
    }
}

/// Fixed-capacity shared store with LRU eviction and per-key expiry
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    capacity: usize,
    evict: bool,
    cheap_enumeration: bool,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries, evicting when full
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            evict: true,
            cheap_enumeration: false,
        }
    }

    /// Refuse writes with `NoMemory` instead of evicting when full
    pub fn with_eviction(mut self, evict: bool) -> Self {
        self.evict = evict;
        self
    }

    /// Advertise `keys()` as cheap so the exporter can bypass the catalog
    pub fn with_cheap_enumeration(mut self, cheap: bool) -> Self {
        self.cheap_enumeration = cheap;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, including ones that expired but were not yet purged
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut inner = self.lock()?;
        if !inner.live(key, Instant::now()) {
            return Ok(None);
        }
        let tick = inner.touch();
        Ok(inner.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.value.clone()
        }))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<Stored> {
        let mut inner = self.lock()?;
        inner.insert(key, value, ttl, self.capacity, self.evict)
    }

    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<Stored> {
        let mut inner = self.lock()?;
        if inner.live(key, Instant::now()) {
            return Err(StoreError::Exists);
        }
        inner.insert(key, value, ttl, self.capacity, self.evict)
    }

    fn incr(&self, key: &str, delta: f64, init: Option<f64>) -> StoreResult<(f64, Stored)> {
        let mut inner = self.lock()?;
        if !inner.live(key, Instant::now()) {
            let Some(init) = init else {
                return Err(StoreError::NotFound);
            };
            let value = init + delta;
            let stored = inner.insert(key, Value::Number(value), None, self.capacity, self.evict)?;
            return Ok((value, stored));
        }

        let tick = inner.touch();
        let entry = inner.entries.get_mut(key).ok_or(StoreError::NotFound)?;
        let Value::Number(current) = entry.value else {
            return Err(StoreError::NotNumeric);
        };
        let value = current + delta;
        entry.value = Value::Number(value);
        entry.last_used = tick;
        Ok((value, Stored::default()))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.entries.remove(key);
        Ok(())
    }

    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        if !inner.live(key, now) {
            return Err(StoreError::NotFound);
        }
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    fn keys(&self, limit: usize) -> StoreResult<Vec<String>> {
        let inner = self.lock()?;
        let now = Instant::now();
        let live = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone());
        Ok(if limit == 0 {
            live.collect()
        } else {
            live.take(limit).collect()
        })
    }

    fn cheap_enumeration(&self) -> bool {
        self.cheap_enumeration
    }
}
