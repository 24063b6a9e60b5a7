//! Shared key/value store contract
//!
//! Every worker context talks to one process-shared store through
//! `Arc<dyn SharedStore>`. All mutations go through the atomic primitives
//! below; callers never read a value and write it back in a second call.

pub mod lock;
pub mod memory;

pub use lock::{StoreLock, StoreLockGuard};
pub use memory::MemoryStore;

use crate::error::StoreResult;
use std::time::Duration;

/// A value held by the shared store
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Counter, gauge and histogram sample values
    Number(f64),
    /// Catalog entries and lock owners
    Text(String),
}

impl Value {
    /// Numeric view of the value, `None` for text entries
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Text view of the value, `None` for numeric entries
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

/// Outcome of a successful mutation
///
/// `forcible` is set when the store had to evict another live entry to make
/// room. The mutation itself took effect; the flag is a soft failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stored {
    pub forcible: bool,
}

/// Operation contract of the shared store
pub trait SharedStore: Send + Sync {
    /// Read a key, `Ok(None)` when absent or expired
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Unconditional overwrite
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<Stored>;

    /// Insert only if absent, `Err(StoreError::Exists)` otherwise
    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<Stored>;

    /// Atomic numeric increment returning the new value
    ///
    /// With `init` the key is created as `init + delta` when absent; without
    /// it an absent key yields `Err(StoreError::NotFound)`.
    fn incr(&self, key: &str, delta: f64, init: Option<f64>) -> StoreResult<(f64, Stored)>;

    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Set a time-to-live on an existing key
    fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;

    /// Enumerate up to `limit` live keys (`0` means all)
    ///
    /// May lock the whole store; never call this proportionally to the
    /// number of live metrics unless [`cheap_enumeration`](Self::cheap_enumeration)
    /// says otherwise.
    fn keys(&self, limit: usize) -> StoreResult<Vec<String>>;

    /// Whether `keys` is cheap enough for the exporter to use directly
    fn cheap_enumeration(&self) -> bool {
        false
    }
}
