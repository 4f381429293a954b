//! Bounded in-process (L1) store backed by [`moka`].
//!
//! Entries carry their own TTL, enforced through moka's per-entry expiration
//! policy, and every removal path (expiry, capacity eviction, replacement,
//! explicit removal) reports through a single eviction listener so the engine
//! can stop refresh tracking and notify its hooks.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::notification::RemovalCause;
use moka::sync::Cache;

use stratum_store::{EvictionListener, EvictionReason, LocalStore, LocalValue};

/// An L1 entry together with the TTL it was inserted with.
#[derive(Clone)]
struct StoredEntry<V> {
    value: LocalValue<V>,
    ttl: Duration,
}

/// Per-entry expiration: each entry lives exactly as long as the TTL the
/// engine supplied on insert. Replacing an entry restarts the clock with the
/// new entry's TTL.
struct EntryTtl;

impl<V: Clone + Send + Sync + 'static> Expiry<String, StoredEntry<V>> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &StoredEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &StoredEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

fn map_cause(cause: RemovalCause) -> EvictionReason {
    match cause {
        RemovalCause::Expired => EvictionReason::Expired,
        RemovalCause::Size => EvictionReason::Capacity,
        RemovalCause::Replaced => EvictionReason::Replaced,
        RemovalCause::Explicit => EvictionReason::Explicit,
    }
}

/// Bounded in-process store with per-entry TTL.
///
/// Keys are full (namespaced) keys; one instance can back several engines.
pub struct MemoryLocalStore<V: Clone + Send + Sync + 'static> {
    cache: Cache<String, StoredEntry<V>>,
}

impl<V: Clone + Send + Sync + 'static> MemoryLocalStore<V> {
    /// Creates a store bounded to `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self::with_listener(capacity, None)
    }

    /// Creates a store bounded to `capacity` entries with an eviction
    /// listener invoked on every removal path.
    pub fn with_listener(capacity: u64, listener: Option<EvictionListener>) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryTtl);
        if let Some(listener) = listener {
            builder = builder.eviction_listener(
                move |key: std::sync::Arc<String>, _entry, cause: RemovalCause| {
                    listener(key.as_str(), map_cause(cause));
                },
            );
        }
        Self {
            cache: builder.build(),
        }
    }

    /// Drains moka's internal maintenance queue.
    ///
    /// Eviction listeners and `entry_count` are eventually consistent; tests
    /// call this to observe removals deterministically.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl<V: Clone + Send + Sync + 'static> LocalStore<V> for MemoryLocalStore<V> {
    fn try_get(&self, full_key: &str) -> Option<LocalValue<V>> {
        self.cache.get(full_key).map(|entry| entry.value)
    }

    fn set(&self, full_key: &str, value: LocalValue<V>, ttl: Duration) {
        self.cache
            .insert(full_key.to_string(), StoredEntry { value, ttl });
    }

    fn remove(&self, full_key: &str) {
        self.cache.invalidate(full_key);
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
