//! The cache engine: coordinates L1, L2, locks, the data source, and the
//! refresh scheduler.
//!
//! ## Read path
//!
//! ```text
//! get(key) → L1 → L2 → NotFound          (never loads, never locks)
//! get_or_load(key) → get → lock ladder → query → write-through
//! ```
//!
//! ## Ordering rules
//!
//! Writes go to L2 strictly before L1, so a reader that misses L1 can never
//! observe an older L2 value while a newer one sits in L1. Invalidation
//! removes from L1 strictly before L2. Within one `get_or_load` critical
//! section the data source is read exactly once, after both locks are held.
//!
//! ## Cancellation
//!
//! Every public operation is a plain future; dropping it abandons the work
//! at the next suspension point. Held locks release deterministically: the
//! in-process guard on drop, the remote guard through a detached release
//! task (and, failing everything, its guard TTL).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stratum_core::{CacheStatus, Codec, JsonCodec, KeyEncode, Result, full_key};
use stratum_store::{DataSource, LocalValue};

use crate::builder::StratumCacheBuilder;
use crate::facade::{LocalFacade, RemoteFacade, RemoteValue};
use crate::health::{HealthCheck, ProbeRegistry};
use crate::hooks::EventHooks;
use crate::lock::{KeyedLockGuard, KeyedLockTable, RemoteLockFacility, RemoteLockGuard};
use crate::refresh::{REFRESH_TICK, RefreshScheduler};
use crate::telemetry::Telemetry;

/// Bound alias for values the engine can cache.
pub trait CacheValue: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Callback that broadcasts an invalidated full key to other instances.
pub type InvalidationPublisher = Arc<dyn Fn(&str) + Send + Sync>;

/// A snapshot of engine state for operational endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// The engine's namespace.
    pub namespace: String,
    /// Active tier combination: `tiered`, `local`, `remote`, or `disabled`.
    pub mode: &'static str,
    /// Approximate L1 entry count (shared store: counts all namespaces).
    pub l1_entries: u64,
    /// Keys currently tracked for background refresh.
    pub refresh_tracked: usize,
    /// In-process lock slots created so far.
    pub lock_slots: usize,
}

/// Two-level cache bound to one namespace and one value type.
///
/// Cloning is cheap and shares the engine.
pub struct StratumCache<V: CacheValue, C: Codec = JsonCodec> {
    inner: Arc<Inner<V, C>>,
}

impl<V: CacheValue, C: Codec> Clone for StratumCache<V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<V: CacheValue, C: Codec> {
    pub(crate) namespace: String,
    pub(crate) config: stratum_core::CacheConfig,
    pub(crate) local: Option<LocalFacade<V>>,
    pub(crate) remote: Option<RemoteFacade<C>>,
    pub(crate) remote_locks: Option<RemoteLockFacility>,
    pub(crate) source: Arc<dyn DataSource<V>>,
    pub(crate) locks: KeyedLockTable,
    pub(crate) scheduler: Option<Arc<RefreshScheduler>>,
    pub(crate) hooks: Arc<dyn EventHooks<V>>,
    pub(crate) telemetry: Telemetry,
    pub(crate) health: ProbeRegistry,
    pub(crate) invalidation_publisher: Option<InvalidationPublisher>,
}

impl<V: CacheValue> StratumCache<V, JsonCodec> {
    /// Starts building an engine for the given namespace, with the JSON
    /// codec. Use [`StratumCacheBuilder::codec`] to switch codecs.
    pub fn builder(namespace: impl Into<String>) -> StratumCacheBuilder<V, JsonCodec> {
        StratumCacheBuilder::new(namespace)
    }
}

impl<V: CacheValue, C: Codec> StratumCache<V, C> {
    pub(crate) fn from_inner(inner: Arc<Inner<V, C>>) -> Self {
        Self { inner }
    }

    /// The namespace this engine is bound to.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Reads a key from the cache tiers only.
    ///
    /// Never invokes the data source and never takes locks. Reads are total:
    /// remote-tier problems degrade to [`CacheStatus::NotFound`] and are
    /// recorded, not returned.
    pub async fn get<K: KeyEncode + ?Sized>(&self, key: &K) -> CacheStatus<V> {
        self.inner.get_status(&key.encode_key()).await
    }

    /// Reads a key, loading it from the data source on a full miss, with
    /// stampede suppression.
    ///
    /// Concurrent callers for the same key collapse to a single data-source
    /// load: the per-key in-process lock provides single-flight within the
    /// process, and the remote lock (when enabled) across processes. Lock
    /// failures degrade to an unlocked load rather than failing the call.
    ///
    /// `ttl` overrides the configured default L2 TTL for this write.
    ///
    /// # Errors
    ///
    /// Data-source errors and encode failures are surfaced; cache-layer
    /// problems are absorbed.
    pub async fn get_or_load<K: KeyEncode + ?Sized>(
        &self,
        key: &K,
        ttl: Option<Duration>,
    ) -> Result<CacheStatus<V>> {
        self.inner.get_or_load(&key.encode_key(), ttl).await
    }

    /// Writes a value through both tiers, L2 first.
    ///
    /// A returned `Ok` means the write was *accepted*: L1 is updated and L2
    /// was attempted. It does not guarantee the value is durably cached in
    /// L2, because remote failures are absorbed and recorded so cache
    /// unavailability cannot crash callers.
    ///
    /// # Errors
    ///
    /// Returns the codec's error when the value cannot be encoded.
    pub async fn put<K: KeyEncode + ?Sized>(
        &self,
        key: &K,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.inner
            .write_locked(&key.encode_key(), LocalValue::Value(value.clone()), ttl)
            .await
    }

    /// Caches "known absent" for a key, using the configured negative TTL.
    ///
    /// Subsequent reads within the TTL return [`CacheStatus::KnownAbsent`]
    /// without touching the data source.
    pub async fn put_absent<K: KeyEncode + ?Sized>(&self, key: &K) {
        // Tombstones bypass the codec, so this write cannot fail.
        let _ = self
            .inner
            .write_locked(&key.encode_key(), LocalValue::Tombstone, None)
            .await;
    }

    /// Writes a value to L2 only if the key is currently absent there.
    ///
    /// L1 is deliberately not written: on a failed condition the caller
    /// would otherwise observe its own rejected value locally. The next
    /// `get` populates L1 from whatever L2 holds.
    ///
    /// # Errors
    ///
    /// Returns the codec's error when the value cannot be encoded. A
    /// transport failure reads as `Ok(false)`.
    pub async fn put_if_absent<K: KeyEncode + ?Sized>(
        &self,
        key: &K,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        self.inner
            .put_if_absent(&key.encode_key(), value, ttl)
            .await
    }

    /// Removes a key from both tiers, L1 first. Best effort, not
    /// lock-guarded; idempotent.
    ///
    /// Returns whether the remote tier reported a deletion.
    pub async fn invalidate<K: KeyEncode + ?Sized>(&self, key: &K) -> bool {
        self.inner.invalidate(&key.encode_key()).await
    }

    /// Writes through to the data source, then invalidates both tiers.
    ///
    /// Invalidate-after-commit is used instead of write-through-to-cache so
    /// a source commit that outlives a concurrent cache write cannot leave
    /// the stale value cached.
    ///
    /// # Errors
    ///
    /// Data-source errors are surfaced; the invalidation still runs only
    /// after a successful commit.
    pub async fn update<K: KeyEncode + ?Sized>(&self, key: &K, value: &V) -> Result<()> {
        self.inner.update(&key.encode_key(), value).await
    }

    /// Forces revalidation: bypasses both tiers, queries the data source,
    /// and writes the result through.
    ///
    /// # Errors
    ///
    /// Data-source errors and encode failures are surfaced.
    pub async fn reload<K: KeyEncode + ?Sized>(
        &self,
        key: &K,
        ttl: Option<Duration>,
    ) -> Result<CacheStatus<V>> {
        self.inner.reload(&key.encode_key(), ttl).await
    }

    /// Reads many keys from the cache tiers only.
    ///
    /// L1 misses are fetched from L2 in a single round trip and backfilled.
    /// The result maps encoded keys to values and contains only hits; keys
    /// cached as absent are neither returned nor eligible for loading.
    pub async fn batch_get<K: KeyEncode>(&self, keys: &[K]) -> HashMap<String, V> {
        let keys: Vec<String> = keys.iter().map(KeyEncode::encode_key).collect();
        self.inner.batch_get(&keys).await.0
    }

    /// Reads many keys, bulk-loading whatever the tiers are missing.
    ///
    /// Still-missing keys after [`batch_get`](Self::batch_get) go to the
    /// data source's batch query; each loaded entry is backfilled through a
    /// per-key locked path that skips keys a concurrent writer beat it to.
    /// Keys the loader omits are tombstoned when negative caching is on.
    ///
    /// # Errors
    ///
    /// Data-source errors and encode failures are surfaced.
    pub async fn batch_get_or_load<K: KeyEncode>(
        &self,
        keys: &[K],
        ttl: Option<Duration>,
    ) -> Result<HashMap<String, V>> {
        let keys: Vec<String> = keys.iter().map(KeyEncode::encode_key).collect();
        self.inner.batch_get_or_load(&keys, ttl).await
    }

    /// Removes many keys from both tiers: L1 individually, then one L2
    /// multi-delete. Returns the number of L2 deletions.
    pub async fn batch_invalidate<K: KeyEncode>(&self, keys: &[K]) -> u64 {
        let keys: Vec<String> = keys.iter().map(KeyEncode::encode_key).collect();
        self.inner.batch_invalidate(&keys).await
    }

    /// Runs every registered health probe.
    pub async fn health(&self) -> Vec<(&'static str, HealthCheck)> {
        self.inner.health.check_all().await
    }

    /// A snapshot of engine state.
    pub fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        CacheStats {
            namespace: inner.namespace.clone(),
            mode: match (&inner.local, &inner.remote) {
                (Some(_), Some(_)) => "tiered",
                (Some(_), None) => "local",
                (None, Some(_)) => "remote",
                (None, None) => "disabled",
            },
            l1_entries: inner.local.as_ref().map_or(0, LocalFacade::entry_count),
            refresh_tracked: inner
                .scheduler
                .as_ref()
                .map_or(0, |scheduler| scheduler.tracked_count()),
            lock_slots: inner.locks.slot_count(),
        }
    }

    /// Stops refresh tracking for every key. The tick loop itself ends when
    /// the last engine handle is dropped.
    pub fn shutdown(&self) {
        if let Some(scheduler) = &self.inner.scheduler {
            scheduler.clear();
        }
    }
}

impl<V: CacheValue, C: Codec> Inner<V, C> {
    fn clamped_local_ttl(&self, remote_ttl: Duration) -> Duration {
        self.config.default_local_ttl().min(remote_ttl)
    }

    fn negative_local_ttl(&self) -> Duration {
        self.config
            .default_local_ttl()
            .min(self.config.negative_cache.ttl())
    }

    /// Inserts into L1 and performs the bookkeeping every L1 insert implies:
    /// the local-set hook and refresh tracking.
    fn set_local(&self, key: &str, value: LocalValue<V>, ttl: Duration) {
        let Some(local) = &self.local else {
            return;
        };
        self.hooks.on_local_set(key, &value);
        local.set(key, value, ttl);
        if let Some(scheduler) = &self.scheduler {
            scheduler.track(key);
        }
    }

    pub(crate) async fn get_status(&self, key: &str) -> CacheStatus<V> {
        if let Some(local) = &self.local {
            if let Some(value) = local.try_get(key) {
                tracing::debug!(key = %key, "Cache hit (L1)");
                self.telemetry.record_hit("l1", key);
                return value.into_status();
            }
        }
        let Some(remote) = &self.remote else {
            self.telemetry.record_miss(key);
            return CacheStatus::NotFound;
        };
        match remote.get::<V>(key).await {
            RemoteValue::Value(value) => {
                tracing::debug!(key = %key, "Cache hit (L2)");
                self.telemetry.record_hit("l2", key);
                self.set_local(
                    key,
                    LocalValue::Value(value.clone()),
                    self.clamped_local_ttl(self.config.default_remote_ttl()),
                );
                CacheStatus::Found(value)
            }
            RemoteValue::Tombstone => {
                tracing::debug!(key = %key, "Cache hit (L2 tombstone)");
                self.telemetry.record_hit("l2", key);
                self.set_local(key, LocalValue::Tombstone, self.negative_local_ttl());
                CacheStatus::KnownAbsent
            }
            RemoteValue::Missing => {
                tracing::debug!(key = %key, "Cache miss");
                self.telemetry.record_miss(key);
                CacheStatus::NotFound
            }
        }
    }

    async fn acquire_local_lock(&self, key: &str) -> Option<KeyedLockGuard> {
        if !self.config.locks.in_process {
            return None;
        }
        match self
            .locks
            .acquire(key, self.config.locks.wait_budget())
            .await
        {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "In-process lock timed out, continuing unlocked");
                self.telemetry.record_lock_timeout("in_process");
                self.telemetry.record_absorbed(e.category());
                None
            }
        }
    }

    async fn acquire_remote_lock(&self, key: &str) -> Option<RemoteLockGuard> {
        let facility = self.remote_locks.as_ref()?;
        let guard = facility.take(key, self.config.locks.wait_budget()).await;
        if guard.is_none() {
            self.telemetry.record_lock_timeout("remote");
        }
        guard
    }

    /// The unlocked write path: L2 strictly before L1, with the TTL clamp.
    ///
    /// Takes no locks itself, which is what lets `get_or_load` call it from
    /// inside its critical section without re-entering the non-reentrant
    /// lock table.
    async fn write_entry(
        &self,
        key: &str,
        value: LocalValue<V>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let remote_ttl = match &value {
            LocalValue::Value(_) => ttl.unwrap_or_else(|| self.config.default_remote_ttl()),
            LocalValue::Tombstone => ttl.unwrap_or_else(|| self.config.negative_cache.ttl()),
        };

        if let Some(remote) = &self.remote {
            match &value {
                LocalValue::Value(v) => remote.set_value(key, v, remote_ttl).await?,
                LocalValue::Tombstone => remote.set_tombstone(key, remote_ttl).await,
            }
            self.hooks.on_remote_set(key, &value, remote_ttl);
            self.telemetry.record_write("l2");
        }

        if self.local.is_some() {
            let local_ttl = self.clamped_local_ttl(remote_ttl);
            self.set_local(key, value, local_ttl);
            self.telemetry.record_write("l1");
        }
        Ok(())
    }

    /// The locked write path: best-effort in-process and remote locks around
    /// [`write_entry`](Self::write_entry).
    pub(crate) async fn write_locked(
        &self,
        key: &str,
        value: LocalValue<V>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let _local_guard = self.acquire_local_lock(key).await;
        let remote_guard = self.acquire_remote_lock(key).await;
        let result = self.write_entry(key, value, ttl).await;
        if let Some(guard) = remote_guard {
            guard.release().await;
        }
        result
    }

    pub(crate) async fn get_or_load(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<CacheStatus<V>> {
        // Optimistic path: most calls end here.
        let status = self.get_status(key).await;
        if status.is_settled() {
            return Ok(status);
        }

        let _local_guard = self.acquire_local_lock(key).await;

        // Double-check: another task may have loaded while we waited.
        let status = self.get_status(key).await;
        if status.is_settled() {
            return Ok(status);
        }

        let mut remote_guard = self.acquire_remote_lock(key).await;

        // Triple-check: another *process* may have loaded while we polled.
        if remote_guard.is_some() {
            let status = self.get_status(key).await;
            if status.is_settled() {
                if let Some(guard) = remote_guard.take() {
                    guard.release().await;
                }
                return Ok(status);
            }
        }

        let outcome = match self.source.query(key).await {
            Ok(Some(value)) => {
                self.telemetry.record_load("value");
                match self
                    .write_entry(key, LocalValue::Value(value.clone()), ttl)
                    .await
                {
                    Ok(()) => Ok(CacheStatus::Found(value)),
                    Err(e) => Err(e),
                }
            }
            Ok(None) if self.config.negative_cache.enabled => {
                self.telemetry.record_load("absent");
                let _ = self.write_entry(key, LocalValue::Tombstone, None).await;
                Ok(CacheStatus::KnownAbsent)
            }
            Ok(None) => {
                self.telemetry.record_load("absent");
                Ok(CacheStatus::NotFound)
            }
            Err(e) => {
                self.telemetry.record_load("error");
                Err(e)
            }
        };

        if let Some(guard) = remote_guard.take() {
            guard.release().await;
        }
        outcome
    }

    async fn put_if_absent(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<bool> {
        let remote_ttl = ttl.unwrap_or_else(|| self.config.default_remote_ttl());
        if let Some(remote) = &self.remote {
            let applied = remote.set_value_if_absent(key, value, remote_ttl).await?;
            if applied {
                self.hooks
                    .on_remote_set(key, &LocalValue::Value(value.clone()), remote_ttl);
                self.telemetry.record_write("l2");
            }
            Ok(applied)
        } else if let Some(local) = &self.local {
            // No remote tier: the conditional degrades to L1.
            if local.try_get(key).is_some() {
                return Ok(false);
            }
            self.set_local(
                key,
                LocalValue::Value(value.clone()),
                self.clamped_local_ttl(remote_ttl),
            );
            self.telemetry.record_write("l1");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) async fn invalidate(&self, key: &str) -> bool {
        // L1 strictly first, so a racing reader re-reads L2 rather than
        // resurrecting the local copy.
        if let Some(local) = &self.local {
            local.remove(key);
        }
        // Stop refresh tracking now; the store's eviction notification for
        // this removal may arrive arbitrarily late.
        if let Some(scheduler) = &self.scheduler {
            scheduler.untrack(key);
        }
        let deleted = match &self.remote {
            Some(remote) => remote.delete(key).await,
            None => false,
        };
        if let Some(publish) = &self.invalidation_publisher {
            publish(&full_key(&self.namespace, key));
        }
        self.telemetry.record_invalidation();
        tracing::debug!(key = %key, deleted = deleted, "Invalidated");
        deleted
    }

    async fn update(&self, key: &str, value: &V) -> Result<()> {
        self.source.update(key, value).await?;
        self.invalidate(key).await;
        Ok(())
    }

    async fn reload(&self, key: &str, ttl: Option<Duration>) -> Result<CacheStatus<V>> {
        match self.source.query(key).await? {
            Some(value) => {
                self.telemetry.record_load("value");
                self.write_locked(key, LocalValue::Value(value.clone()), ttl)
                    .await?;
                Ok(CacheStatus::Found(value))
            }
            None if self.config.negative_cache.enabled => {
                self.telemetry.record_load("absent");
                let _ = self.write_locked(key, LocalValue::Tombstone, None).await;
                Ok(CacheStatus::KnownAbsent)
            }
            None => {
                self.telemetry.record_load("absent");
                self.invalidate(key).await;
                Ok(CacheStatus::NotFound)
            }
        }
    }

    /// Tier-only batch read. Returns hits and the set of keys cached as
    /// absent; input duplicates are collapsed.
    pub(crate) async fn batch_get(
        &self,
        keys: &[String],
    ) -> (HashMap<String, V>, HashSet<String>) {
        let mut hits = HashMap::new();
        let mut known_absent = HashSet::new();
        let mut missing: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match self.local.as_ref().and_then(|local| local.try_get(key)) {
                Some(LocalValue::Value(value)) => {
                    self.telemetry.record_hit("l1", key);
                    hits.insert(key.clone(), value);
                }
                Some(LocalValue::Tombstone) => {
                    self.telemetry.record_hit("l1", key);
                    known_absent.insert(key.clone());
                }
                None => missing.push(key.clone()),
            }
        }

        if !missing.is_empty() {
            if let Some(remote) = &self.remote {
                let results = remote.multi_get::<V>(&missing).await;
                for (key, result) in missing.iter().zip(results) {
                    match result {
                        RemoteValue::Value(value) => {
                            self.telemetry.record_hit("l2", key);
                            self.set_local(
                                key,
                                LocalValue::Value(value.clone()),
                                self.clamped_local_ttl(self.config.default_remote_ttl()),
                            );
                            hits.insert(key.clone(), value);
                        }
                        RemoteValue::Tombstone => {
                            self.telemetry.record_hit("l2", key);
                            self.set_local(key, LocalValue::Tombstone, self.negative_local_ttl());
                            known_absent.insert(key.clone());
                        }
                        RemoteValue::Missing => {
                            self.telemetry.record_miss(key);
                        }
                    }
                }
            } else {
                for key in &missing {
                    self.telemetry.record_miss(key);
                }
            }
        }

        (hits, known_absent)
    }

    /// Locked backfill for one bulk-loaded entry: per-key lock, existence
    /// double-check, then the ordered write. A concurrent writer that got
    /// there first wins; its value is assumed newer than the loader's.
    async fn backfill_loaded(
        &self,
        key: &str,
        value: LocalValue<V>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let _local_guard = self.acquire_local_lock(key).await;
        if self
            .local
            .as_ref()
            .is_some_and(|local| local.try_get(key).is_some())
        {
            return Ok(());
        }
        let remote_guard = self.acquire_remote_lock(key).await;
        let result = self.write_entry(key, value, ttl).await;
        if let Some(guard) = remote_guard {
            guard.release().await;
        }
        result
    }

    async fn batch_get_or_load(
        &self,
        keys: &[String],
        ttl: Option<Duration>,
    ) -> Result<HashMap<String, V>> {
        let (mut hits, known_absent) = self.batch_get(keys).await;

        let mut missing: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for key in keys {
            if seen.insert(key.as_str())
                && !hits.contains_key(key)
                && !known_absent.contains(key)
            {
                missing.push(key.clone());
            }
        }
        if missing.is_empty() {
            return Ok(hits);
        }

        let loaded = self.source.query_batch(&missing).await?;
        self.telemetry.record_load("batch");

        for key in &missing {
            match loaded.get(key) {
                Some(value) => {
                    self.backfill_loaded(key, LocalValue::Value(value.clone()), ttl)
                        .await?;
                    hits.insert(key.clone(), value.clone());
                }
                None if self.config.negative_cache.enabled => {
                    let _ = self.backfill_loaded(key, LocalValue::Tombstone, None).await;
                }
                None => {}
            }
        }
        Ok(hits)
    }

    async fn batch_invalidate(&self, keys: &[String]) -> u64 {
        if let Some(local) = &self.local {
            for key in keys {
                local.remove(key);
            }
        }
        if let Some(scheduler) = &self.scheduler {
            for key in keys {
                scheduler.untrack(key);
            }
        }
        let deleted = match &self.remote {
            Some(remote) => remote.multi_delete(keys).await,
            None => 0,
        };
        if let Some(publish) = &self.invalidation_publisher {
            for key in keys {
                publish(&full_key(&self.namespace, key));
            }
        }
        self.telemetry.record_invalidation();
        deleted
    }

    /// One background refresh attempt for one key; see the scheduler module
    /// for the tick loop that drives this.
    pub(crate) async fn refresh_entry(&self, key: &str) -> Result<()> {
        let Some(scheduler) = &self.scheduler else {
            return Ok(());
        };
        let Some(local) = &self.local else {
            scheduler.untrack(key);
            return Ok(());
        };
        if local.try_get(key).is_none() {
            // The entry died since it was tracked; stop revalidating it.
            scheduler.untrack(key);
            return Ok(());
        }

        // Prefer the shared tier: another instance may have written a newer
        // value that this instance's L1 has not seen.
        if let Some(remote) = &self.remote {
            if let RemoteValue::Value(value) = remote.get::<V>(key).await {
                self.write_locked(key, LocalValue::Value(value), None).await?;
                scheduler.mark_refreshed(key);
                self.telemetry.record_refresh("remote");
                return Ok(());
            }
        }

        match self.source.query(key).await {
            Ok(Some(value)) => {
                self.write_locked(key, LocalValue::Value(value), None).await?;
                scheduler.mark_refreshed(key);
                self.telemetry.record_refresh("source");
            }
            Ok(None) if self.config.negative_cache.enabled => {
                let _ = self.write_locked(key, LocalValue::Tombstone, None).await;
                scheduler.mark_refreshed(key);
                self.telemetry.record_refresh("absent");
            }
            Ok(None) => {
                self.invalidate(key).await;
                scheduler.untrack(key);
                self.telemetry.record_refresh("invalidated");
            }
            Err(e) => {
                // A failed refresh leaves the entry untouched; it will be
                // retried on the next tick.
                self.telemetry.record_refresh("error");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Spawns the refresh tick loop. The loop holds only a weak engine
/// reference and exits once the last strong handle is dropped; a failure
/// refreshing one key never stops the loop or affects other keys.
pub(crate) fn spawn_refresh_loop<V: CacheValue, C: Codec>(
    inner: &Arc<Inner<V, C>>,
) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(REFRESH_TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let Some(scheduler) = inner.scheduler.as_ref() else {
                break;
            };
            for key in scheduler.due_keys() {
                if let Err(e) = inner.refresh_entry(&key).await {
                    tracing::warn!(key = %key, error = %e, "Background refresh failed");
                }
            }
        }
    })
}
