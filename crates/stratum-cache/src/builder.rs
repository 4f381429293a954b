//! Wires configuration and collaborators into a running engine.

use std::sync::Arc;

use stratum_core::{CacheConfig, CacheError, Codec, JsonCodec, Result};
use stratum_memory::MemoryLocalStore;
use stratum_redis::{InvalidationHandler, InvalidationListener, publish_invalidation};
use stratum_store::{
    DataSource, EvictionListener, EvictionReason, LocalStore, RefreshPolicy, RemoteStore,
};

use crate::engine::{CacheValue, Inner, InvalidationPublisher, StratumCache, spawn_refresh_loop};
use crate::facade::{LocalFacade, RemoteFacade};
use crate::health::{LocalStoreProbe, ProbeRegistry, RemoteStoreProbe};
use crate::hooks::{EventHooks, NoopHooks};
use crate::lock::{KeyedLockTable, RemoteLockFacility};
use crate::refresh::RefreshScheduler;
use crate::telemetry::Telemetry;

/// Builder for [`StratumCache`].
///
/// With no overrides, `build` constructs the production backends from
/// configuration: a moka-bounded L1 and a ping-checked Redis L2 that falls
/// back to local-only mode when unreachable. Custom stores replace either
/// tier; a custom local store skips the engine's eviction wiring, in which
/// case refresh tracking is cleaned up lazily by the refresh path instead.
pub struct StratumCacheBuilder<V: CacheValue, C: Codec = JsonCodec> {
    namespace: String,
    config: CacheConfig,
    codec: C,
    source: Option<Arc<dyn DataSource<V>>>,
    local_store: Option<Arc<dyn LocalStore<V>>>,
    remote_store: Option<Arc<dyn RemoteStore>>,
    hooks: Arc<dyn EventHooks<V>>,
    refresh_policy: Option<Arc<dyn RefreshPolicy>>,
    invalidation_publisher: Option<InvalidationPublisher>,
    subscribe_invalidations: bool,
}

impl<V: CacheValue> StratumCacheBuilder<V, JsonCodec> {
    /// Starts a builder for the given namespace with default configuration
    /// and the JSON codec.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            config: CacheConfig::default(),
            codec: JsonCodec,
            source: None,
            local_store: None,
            remote_store: None,
            hooks: Arc::new(NoopHooks),
            refresh_policy: None,
            invalidation_publisher: None,
            subscribe_invalidations: false,
        }
    }
}

impl<V: CacheValue, C: Codec> StratumCacheBuilder<V, C> {
    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the data source. Required.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DataSource<V>>) -> Self {
        self.source = Some(source);
        self
    }

    /// Switches the wire codec.
    #[must_use]
    pub fn codec<C2: Codec>(self, codec: C2) -> StratumCacheBuilder<V, C2> {
        StratumCacheBuilder {
            namespace: self.namespace,
            config: self.config,
            codec,
            source: self.source,
            local_store: self.local_store,
            remote_store: self.remote_store,
            hooks: self.hooks,
            refresh_policy: self.refresh_policy,
            invalidation_publisher: self.invalidation_publisher,
            subscribe_invalidations: self.subscribe_invalidations,
        }
    }

    /// Supplies a custom L1 store (shared across engines is fine; entries
    /// are namespaced).
    #[must_use]
    pub fn local_store(mut self, store: Arc<dyn LocalStore<V>>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Supplies a custom L2 store instead of the config-built Redis one.
    #[must_use]
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    /// Installs event hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn EventHooks<V>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Installs a per-key refresh interval policy.
    #[must_use]
    pub fn refresh_policy(mut self, policy: Arc<dyn RefreshPolicy>) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Installs a custom invalidation broadcast. When the engine builds its
    /// own Redis tier this is wired automatically to pub/sub.
    #[must_use]
    pub fn invalidation_publisher(mut self, publisher: InvalidationPublisher) -> Self {
        self.invalidation_publisher = Some(publisher);
        self
    }

    /// Also subscribe this instance to invalidations published by others,
    /// removing matching L1 entries as they arrive. Requires the
    /// config-built Redis tier.
    #[must_use]
    pub fn subscribe_invalidations(mut self, subscribe: bool) -> Self {
        self.subscribe_invalidations = subscribe;
        self
    }

    /// Validates the configuration, connects the tiers, and starts the
    /// background loops.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] for an invalid config, an empty
    /// namespace, or a missing data source. An unreachable Redis is *not* an
    /// error: the engine starts in local-only mode and logs the downgrade.
    pub async fn build(self) -> Result<StratumCache<V, C>> {
        self.config.validate()?;
        if self.namespace.is_empty() {
            return Err(CacheError::configuration("namespace must not be empty"));
        }
        let source = self
            .source
            .ok_or_else(|| CacheError::configuration("a data source is required"))?;

        let namespace = self.namespace;
        let config = self.config;
        let codec = Arc::new(self.codec);
        let hooks = self.hooks;
        let telemetry = Telemetry::new(namespace.clone(), config.telemetry.clone());

        let scheduler = config
            .refresh
            .enabled
            .then(|| {
                Arc::new(RefreshScheduler::new(
                    config.refresh.default_interval(),
                    self.refresh_policy,
                ))
            });

        // Remote tier: explicit store, or Redis from config with ping-checked
        // fallback to local-only mode.
        let mut publisher = self.invalidation_publisher;
        let mut redis_url: Option<String> = None;
        let remote_store: Option<Arc<dyn RemoteStore>> = if !config.use_remote_tier {
            None
        } else if let Some(store) = self.remote_store {
            Some(store)
        } else {
            match stratum_redis::connect(&config.remote).await {
                Some(store) => {
                    redis_url = Some(config.remote.url.clone());
                    if publisher.is_none() {
                        publisher = Some(make_pubsub_publisher(store.pool().clone()));
                    }
                    Some(Arc::new(store))
                }
                None => {
                    tracing::warn!(
                        namespace = %namespace,
                        "Remote tier unreachable, continuing in local-only mode"
                    );
                    None
                }
            }
        };

        // Local tier: explicit store, or a moka-bounded one with eviction
        // wiring into the scheduler, hooks, and telemetry.
        let local_store: Option<Arc<dyn LocalStore<V>>> = if !config.use_local_tier {
            None
        } else if let Some(store) = self.local_store {
            Some(store)
        } else {
            let listener = make_eviction_listener(
                namespace.clone(),
                scheduler.clone(),
                Arc::clone(&hooks),
                telemetry.clone(),
            );
            Some(Arc::new(MemoryLocalStore::with_listener(
                config.local_capacity,
                Some(listener),
            )))
        };

        if self.subscribe_invalidations {
            match (&local_store, &redis_url) {
                (Some(store), Some(url)) => {
                    let store = Arc::clone(store);
                    let handler: InvalidationHandler =
                        Arc::new(move |full_key: &str| store.remove(full_key));
                    let _listener = InvalidationListener::new(url.clone(), handler).start();
                }
                _ => {
                    tracing::warn!(
                        namespace = %namespace,
                        "Invalidation subscription requested but unavailable (needs L1 and the config-built Redis tier)"
                    );
                }
            }
        }

        let remote_locks = match (&remote_store, config.locks.remote) {
            (Some(store), true) => Some(RemoteLockFacility::new(
                Arc::clone(store),
                namespace.clone(),
                config.locks.remote_guard(),
            )),
            _ => None,
        };

        let mut health = ProbeRegistry::new();
        if let Some(store) = &remote_store {
            health.add(Box::new(RemoteStoreProbe::new(Arc::clone(store))));
        }
        if let Some(store) = &local_store {
            health.add(Box::new(LocalStoreProbe::new(
                Arc::clone(store),
                namespace.clone(),
            )));
        }

        let inner = Arc::new(Inner {
            local: local_store.map(|store| LocalFacade::new(store, namespace.clone())),
            remote: remote_store.map(|store| {
                RemoteFacade::new(store, Arc::clone(&codec), namespace.clone(), telemetry.clone())
            }),
            remote_locks,
            source,
            locks: KeyedLockTable::new(),
            scheduler,
            hooks,
            telemetry,
            health,
            invalidation_publisher: publisher,
            namespace,
            config,
        });

        if inner.scheduler.is_some() {
            let _refresh_loop = spawn_refresh_loop(&inner);
        }

        Ok(StratumCache::from_inner(inner))
    }
}

/// Broadcast through Redis pub/sub, fire-and-forget like the engine's other
/// remote side effects.
fn make_pubsub_publisher(pool: stratum_redis::Pool) -> InvalidationPublisher {
    Arc::new(move |full_key: &str| {
        let pool = pool.clone();
        let full_key = full_key.to_string();
        tokio::spawn(async move {
            if let Err(e) = publish_invalidation(&pool, &full_key).await {
                tracing::warn!(key = %full_key, error = %e, "Failed to publish invalidation");
            }
        });
    })
}

fn make_eviction_listener<V: CacheValue>(
    namespace: String,
    scheduler: Option<Arc<RefreshScheduler>>,
    hooks: Arc<dyn EventHooks<V>>,
    telemetry: Telemetry,
) -> EvictionListener {
    Arc::new(move |full_key, reason| {
        // The store may be shared; ignore other namespaces' evictions.
        let Some(key) = stratum_core::user_key(&namespace, full_key) else {
            return;
        };
        if reason != EvictionReason::Replaced {
            if let Some(scheduler) = &scheduler {
                scheduler.untrack(key);
            }
        }
        telemetry.record_eviction(reason);
        hooks.on_eviction(key, reason);
    })
}
