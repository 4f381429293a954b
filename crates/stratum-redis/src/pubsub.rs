//! Redis pub/sub for cross-instance L1 invalidation.
//!
//! When one instance invalidates a key it removes it from its own L1, deletes
//! it from L2, and publishes the full key on [`INVALIDATION_CHANNEL`]. Every
//! other instance runs an [`InvalidationListener`] that removes the key from
//! its L1, so stale local copies disappear within one pub/sub round trip.
//! The publishing instance receiving its own message is harmless; its L1
//! entry is already gone.

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::Pool;
use redis::AsyncCommands;

use stratum_core::{CacheError, Result};

/// Channel carrying invalidated full keys.
pub const INVALIDATION_CHANNEL: &str = "stratum:invalidate";

/// Callback invoked with each invalidated full key.
pub type InvalidationHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Subscribes to the invalidation channel and feeds received keys to a
/// handler.
///
/// The listener runs on a dedicated connection (subscribing consumes it) and
/// reconnects with a fixed backoff after any error.
pub struct InvalidationListener {
    redis_url: String,
    handler: InvalidationHandler,
}

impl InvalidationListener {
    /// Backoff between reconnect attempts.
    const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    /// Creates a listener. Nothing happens until [`start`](Self::start).
    pub fn new(redis_url: impl Into<String>, handler: InvalidationHandler) -> Self {
        Self {
            redis_url: redis_url.into(),
            handler,
        }
    }

    /// Spawns the background subscribe loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.run().await {
                    tracing::error!(error = %e, "Invalidation listener error, reconnecting");
                    tokio::time::sleep(Self::RECONNECT_DELAY).await;
                }
            }
        })
    }

    async fn run(&self) -> Result<()> {
        use futures_util::StreamExt;

        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(|e| CacheError::remote_unavailable(e.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| CacheError::remote_unavailable(e.to_string()))?;
        pubsub
            .subscribe(INVALIDATION_CHANNEL)
            .await
            .map_err(|e| CacheError::remote_unavailable(e.to_string()))?;

        tracing::info!(channel = INVALIDATION_CHANNEL, "Subscribed to invalidations");

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            match message.get_payload::<String>() {
                Ok(full_key) => {
                    tracing::debug!(key = %full_key, "Received invalidation");
                    (self.handler)(&full_key);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable invalidation payload");
                }
            }
        }
        Err(CacheError::remote_unavailable("pub/sub connection closed"))
    }
}

/// Publishes an invalidation for a full key.
pub async fn publish_invalidation(pool: &Pool, full_key: &str) -> Result<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::remote_unavailable(e.to_string()))?;
    conn.publish::<_, _, ()>(INVALIDATION_CHANNEL, full_key)
        .await
        .map_err(|e| CacheError::remote_unavailable(e.to_string()))?;
    tracing::debug!(key = %full_key, "Published invalidation");
    Ok(())
}
