//! Typed view over the in-process tier.

use std::sync::Arc;
use std::time::Duration;

use stratum_core::full_key;
use stratum_store::{LocalStore, LocalValue};

/// L1 facade: translates user keys to namespaced full keys and forwards to
/// the shared local store. TTLs are supplied by the engine, already clamped.
pub(crate) struct LocalFacade<V> {
    store: Arc<dyn LocalStore<V>>,
    namespace: String,
}

impl<V: Clone + Send + Sync + 'static> LocalFacade<V> {
    pub fn new(store: Arc<dyn LocalStore<V>>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn full(&self, user_key: &str) -> String {
        full_key(&self.namespace, user_key)
    }

    pub fn try_get(&self, user_key: &str) -> Option<LocalValue<V>> {
        self.store.try_get(&self.full(user_key))
    }

    pub fn set(&self, user_key: &str, value: LocalValue<V>, ttl: Duration) {
        self.store.set(&self.full(user_key), value, ttl);
    }

    pub fn remove(&self, user_key: &str) {
        self.store.remove(&self.full(user_key));
    }

    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }
}
