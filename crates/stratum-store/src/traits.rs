//! Collaborator contracts for the cache engine.
//!
//! The engine orchestrates four collaborators, each defined purely by its
//! operational interface: the in-process store (L1), the remote store (L2),
//! the authoritative data source, and an optional refresh-interval policy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use stratum_core::{CacheError, Result};

use crate::types::LocalValue;

/// The in-process tier: a bounded associative map with per-entry TTL and
/// eviction notification.
///
/// Keys are full (namespaced) keys, so one store instance may be shared by
/// engines with different namespaces. Implementations must be thread-safe
/// and must invoke their eviction listener on every removal path, including
/// explicit removes and replacements.
pub trait LocalStore<V>: Send + Sync {
    /// Returns the live entry for a key, or `None` when absent or expired.
    fn try_get(&self, full_key: &str) -> Option<LocalValue<V>>;

    /// Inserts or replaces an entry with the given TTL.
    ///
    /// The TTL is authoritative: implementations must not extend it.
    fn set(&self, full_key: &str, value: LocalValue<V>, ttl: Duration);

    /// Removes an entry. A no-op when the key is absent.
    fn remove(&self, full_key: &str);

    /// Approximate number of live entries.
    fn entry_count(&self) -> u64;
}

/// The remote tier: a shared key-value store with TTL and primitive mutual
/// exclusion.
///
/// All operations report transport problems as
/// [`CacheError::RemoteUnavailable`]; the engine decides whether to absorb
/// them.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the wire value for a key. `Ok(None)` means the key is absent.
    async fn get(&self, full_key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a wire value with the given TTL.
    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<()>;

    /// Writes a wire value only if the key is currently absent.
    ///
    /// Returns `true` when the write took effect.
    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<bool>;

    /// Deletes a key. Returns `true` when an entry was removed.
    async fn delete(&self, full_key: &str) -> Result<bool>;

    /// Reads many keys in one round trip.
    ///
    /// The result is ordered: `result[i]` corresponds to `full_keys[i]`.
    async fn multi_get(&self, full_keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Deletes many keys in one round trip. Returns the number removed.
    async fn multi_delete(&self, full_keys: &[String]) -> Result<u64>;

    /// Atomically binds `lock_key -> token` only if the key is absent, with
    /// TTL `guard`. Returns `true` when the lock was acquired.
    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration) -> Result<bool>;

    /// Atomically deletes `lock_key` only if its current value equals
    /// `token`. Returns `true` when the lock was released by this call.
    async fn release_lock(&self, lock_key: &str, token: &str) -> Result<bool>;

    /// Round-trip health probe. Returns the observed latency.
    async fn ping(&self) -> Result<Duration>;
}

/// The authoritative data source fronted by the cache.
///
/// Errors from a data source are propagated to callers verbatim, wrapped in
/// [`CacheError::DataSource`]; the engine never absorbs them.
#[async_trait]
pub trait DataSource<V: Send + Sync + 'static>: Send + Sync {
    /// Loads the value for a key. `Ok(None)` means the key genuinely has no
    /// value, which the engine may cache as a tombstone.
    async fn query(&self, key: &str) -> Result<Option<V>>;

    /// Loads many keys at once. Keys without a value are simply omitted from
    /// the result map.
    ///
    /// The default implementation queries serially; override it when the
    /// backing store has a real batch read.
    async fn query_batch(&self, keys: &[String]) -> Result<HashMap<String, V>> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.query(key).await? {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    /// Writes a value through to the source. Used by the engine's
    /// update-then-invalidate path.
    ///
    /// The default implementation reports the operation as unsupported.
    async fn update(&self, key: &str, value: &V) -> Result<()> {
        let _ = (key, value);
        Err(CacheError::configuration(
            "data source does not support update",
        ))
    }
}

/// Supplies per-key refresh intervals for the background refresh loop.
pub trait RefreshPolicy: Send + Sync {
    /// The refresh interval for a key, or `None` to use the configured
    /// default.
    fn interval_for(&self, key: &str) -> Option<Duration>;
}

/// A refresh policy with one fixed interval for every key.
#[derive(Debug, Clone, Copy)]
pub struct FixedRefreshPolicy(pub Duration);

impl RefreshPolicy for FixedRefreshPolicy {
    fn interval_for(&self, _key: &str) -> Option<Duration> {
        Some(self.0)
    }
}
