//! Per-key cooperative in-process locking.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stratum_core::{CacheError, Result};

/// Per-key mutual exclusion for the load-through and write paths.
///
/// Slots are created lazily on first use and retained for the table's
/// lifetime; for workloads with unbounded key cardinality, watch
/// [`slot_count`](Self::slot_count) and consider an external reaper. The
/// underlying tokio mutex queues waiters in FIFO order, so acquisition is
/// starvation-free.
///
/// The table is **not reentrant**: a task that already holds a key's slot
/// must not acquire it again. The engine keeps locked and unlocked write
/// paths separate for exactly this reason.
pub struct KeyedLockTable {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLockTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Acquires the slot for `key`, waiting at most `wait_budget`.
    ///
    /// The returned guard releases the slot on drop.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::LockTimeout`] when the budget elapses. Callers
    /// treat this as a normal condition and downgrade to a lock-free path.
    pub async fn acquire(&self, key: &str, wait_budget: Duration) -> Result<KeyedLockGuard> {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        match tokio::time::timeout(wait_budget, slot.lock_owned()).await {
            Ok(guard) => Ok(KeyedLockGuard { _guard: guard }),
            Err(_) => Err(CacheError::lock_timeout(key, wait_budget)),
        }
    }

    /// Number of slots created so far.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for KeyedLockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one key's slot; dropping it releases the slot.
#[derive(Debug)]
pub struct KeyedLockGuard {
    _guard: OwnedMutexGuard<()>,
}
