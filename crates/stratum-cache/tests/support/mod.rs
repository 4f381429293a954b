//! Shared test doubles: an in-memory remote store with TTLs and locks, and
//! a data source that counts its loads.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use stratum_cache::{CacheError, DataSource, RemoteStore, Result};

#[derive(Clone)]
struct StoredWire {
    wire: Vec<u8>,
    expires_at: Instant,
}

/// In-memory stand-in for the Redis tier: TTL-honoring entries, NX lock
/// semantics, call counters, and a switch that makes every call fail like a
/// transport error.
#[derive(Default)]
pub struct MockRemoteStore {
    entries: DashMap<String, StoredWire>,
    locks: DashMap<String, (String, Instant)>,
    unreachable: AtomicBool,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub multi_get_calls: AtomicUsize,
    pub last_multi_get: Mutex<Vec<String>>,
}

impl MockRemoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(CacheError::remote_unavailable("mock: unreachable"))
        } else {
            Ok(())
        }
    }

    fn live(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.wire.clone())
    }

    /// Writes directly, bypassing the engine: "another instance wrote this".
    pub fn seed(&self, full_key: &str, wire: Vec<u8>, ttl: Duration) {
        self.entries.insert(
            full_key.to_string(),
            StoredWire {
                wire,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Removes directly, bypassing the engine.
    pub fn wipe(&self, full_key: &str) {
        self.entries.remove(full_key);
    }

    pub fn contains(&self, full_key: &str) -> bool {
        self.live(full_key).is_some()
    }

    pub fn raw(&self, full_key: &str) -> Option<Vec<u8>> {
        self.live(full_key)
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn get(&self, full_key: &str) -> Result<Option<Vec<u8>>> {
        self.check_reachable()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.live(full_key))
    }

    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<()> {
        self.check_reachable()?;
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.seed(full_key, wire.to_vec(), ttl);
        Ok(())
    }

    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<bool> {
        self.check_reachable()?;
        if self.live(full_key).is_some() {
            return Ok(false);
        }
        self.seed(full_key, wire.to_vec(), ttl);
        Ok(true)
    }

    async fn delete(&self, full_key: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.entries.remove(full_key).is_some())
    }

    async fn multi_get(&self, full_keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check_reachable()?;
        self.multi_get_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_multi_get.lock().unwrap() = full_keys.to_vec();
        Ok(full_keys.iter().map(|key| self.live(key)).collect())
    }

    async fn multi_delete(&self, full_keys: &[String]) -> Result<u64> {
        self.check_reachable()?;
        Ok(full_keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count() as u64)
    }

    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration) -> Result<bool> {
        self.check_reachable()?;
        let now = Instant::now();
        match self.locks.entry(lock_key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut held) => {
                let (_, expires_at) = held.get();
                if *expires_at <= now {
                    held.insert((token.to_string(), now + guard));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(free) => {
                free.insert((token.to_string(), now + guard));
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, lock_key: &str, token: &str) -> Result<bool> {
        self.check_reachable()?;
        let removed = self
            .locks
            .remove_if(lock_key, |_, (held_token, _)| held_token == token);
        Ok(removed.is_some())
    }

    async fn ping(&self) -> Result<Duration> {
        self.check_reachable()?;
        Ok(Duration::from_micros(50))
    }
}

/// Data source over a fixed map, counting every load.
pub struct CountingSource<V> {
    values: DashMap<String, V>,
    pub query_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    delay: Option<Duration>,
    failing: AtomicBool,
}

impl<V: Clone + Send + Sync + 'static> CountingSource<V> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            values: DashMap::new(),
            query_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            delay: None,
            failing: AtomicBool::new(false),
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            values: DashMap::new(),
            query_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            delay: Some(delay),
            failing: AtomicBool::new(false),
        })
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.values.insert(key.into(), value);
    }

    pub fn stored(&self, key: &str) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> DataSource<V> for CountingSource<V> {
    async fn query(&self, key: &str) -> Result<Option<V>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::data_source_msg("mock: source down"));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.values.get(key).map(|entry| entry.value().clone()))
    }

    async fn query_batch(&self, keys: &[String]) -> Result<HashMap<String, V>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::data_source_msg("mock: source down"));
        }
        let mut out = HashMap::new();
        for key in keys {
            if let Some(value) = self.values.get(key.as_str()) {
                out.insert(key.clone(), value.value().clone());
            }
        }
        Ok(out)
    }

    async fn update(&self, key: &str, value: &V) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::data_source_msg("mock: source down"));
        }
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}
