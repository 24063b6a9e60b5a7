//! Lease lock on top of the shared store
//!
//! Acquiring means winning a CAS `add` on the lock key. The entry carries a
//! lease TTL so a holder that disappears without releasing cannot wedge
//! other workers for longer than the lease.

use super::{SharedStore, Value};
use crate::catalog::pause_for;
use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lease on the lock key
pub const DEFAULT_LEASE: Duration = Duration::from_secs(5);

/// First pause while the lock is busy, doubled on every retry
const POLL_MIN: Duration = Duration::from_micros(50);
/// Longest pause between two acquisition attempts
const POLL_MAX: Duration = Duration::from_millis(5);

/// Cross-worker mutual exclusion backed by a store key
#[derive(Clone)]
pub struct StoreLock {
    store: Arc<dyn SharedStore>,
    key: String,
    lease: Duration,
    wait: Duration,
}

impl StoreLock {
    /// Create a lock that waits up to one lease for a busy holder
    pub fn new(store: Arc<dyn SharedStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lease: DEFAULT_LEASE,
            wait: DEFAULT_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// How long `acquire` keeps trying before giving up
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Acquire the lock, waiting while another worker holds it
    ///
    /// # Errors
    ///
    /// `StoreError::Timeout` once the wait budget is spent, or the store's
    /// own error if the `add` fails for another reason.
    pub fn acquire(&self) -> StoreResult<StoreLockGuard<'_>> {
        let deadline = Instant::now() + self.wait;
        let mut poll = POLL_MIN;
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            match self
                .store
                .add(&self.key, Value::Text("locked".to_string()), Some(self.lease))
            {
                Ok(_) => return Ok(StoreLockGuard { lock: self }),
                Err(StoreError::Exists) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(key = %self.key, attempt, "Gave up waiting for store lock");
                        return Err(StoreError::Timeout);
                    }
                    tracing::trace!(key = %self.key, attempt, "Lock busy, retrying");
                    pause_for(poll.min(deadline - now));
                    poll = (poll * 2).min(POLL_MAX);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Releases the lock when dropped
pub struct StoreLockGuard<'a> {
    lock: &'a StoreLock,
}

impl Drop for StoreLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.store.delete(&self.lock.key) {
            tracing::error!(
                key = %self.lock.key,
                error = %e,
                "Failed to release store lock; it will expire with its lease"
            );
        }
    }
}
