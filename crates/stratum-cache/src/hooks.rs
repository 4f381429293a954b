//! Engine extension points.

use std::time::Duration;

use stratum_store::{EvictionReason, LocalValue};

/// Observers invoked on the engine's hot path.
///
/// Every method has a no-op default, receives values by reference, and
/// returns nothing. Implementations must not block; spawn a task for
/// anything that does I/O. Keys are user keys (no namespace prefix).
pub trait EventHooks<V>: Send + Sync {
    /// An entry was written to L1 (write path or read backfill).
    fn on_local_set(&self, key: &str, value: &LocalValue<V>) {
        let _ = (key, value);
    }

    /// An entry was written to L2. Useful for secondary-index maintenance,
    /// change notification, or auditing.
    fn on_remote_set(&self, key: &str, value: &LocalValue<V>, ttl: Duration) {
        let _ = (key, value, ttl);
    }

    /// L1 dropped the entry. `reason` is [`EvictionReason::Replaced`] when a
    /// newer value took its place, in which case refresh tracking continues.
    fn on_eviction(&self, key: &str, reason: EvictionReason) {
        let _ = (key, reason);
    }
}

/// The default hooks: observe nothing.
pub(crate) struct NoopHooks;

impl<V> EventHooks<V> for NoopHooks {}
