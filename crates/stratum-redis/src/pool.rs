//! Connection pool construction with ping-checked fallback.

use deadpool_redis::{Config as PoolSettings, Pool, PoolConfig, Runtime, Timeouts};

use stratum_core::{CacheError, RemoteConfig, Result};
use stratum_store::RemoteStore;

use crate::store::RedisRemoteStore;

/// Builds a deadpool-redis pool from the remote tier configuration.
///
/// The logical database index is appended to the connection URL when the URL
/// does not already select one.
///
/// # Errors
///
/// Returns [`CacheError::RemoteUnavailable`] when the URL cannot be parsed or
/// the pool cannot be constructed. No connection is attempted here; use
/// [`connect`] for a ping-checked store.
pub fn create_pool(config: &RemoteConfig) -> Result<Pool> {
    let url = url_with_database(&config.url, config.database);
    let mut settings = PoolSettings::from_url(url);
    let timeout = Some(config.timeout());
    settings.pool = Some(PoolConfig {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        },
        ..PoolConfig::default()
    });
    settings
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::remote_unavailable(e.to_string()))
}

/// Builds a Redis remote store and verifies it with a ping.
///
/// Returns `None` when the pool cannot be built or the ping fails, so the
/// caller can fall back to local-only mode. The failure is logged, not
/// surfaced, so an unreachable remote tier never prevents startup.
pub async fn connect(config: &RemoteConfig) -> Option<RedisRemoteStore> {
    let pool = match create_pool(config) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build Redis pool");
            return None;
        }
    };
    let store = RedisRemoteStore::new(pool);
    match store.ping().await {
        Ok(latency) => {
            tracing::info!(latency_ms = latency.as_millis() as u64, "Connected to Redis");
            Some(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable");
            None
        }
    }
}

fn url_with_database(url: &str, database: u32) -> String {
    if database == 0 || url.trim_end_matches('/').rsplit('/').next().is_some_and(|last| {
        // URL already selects a database ("redis://host:6379/2").
        !last.contains(':') && last.parse::<u32>().is_ok()
    }) {
        url.to_string()
    } else {
        format!("{}/{}", url.trim_end_matches('/'), database)
    }
}
