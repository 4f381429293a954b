//! Redis-backed remote (L2) store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use stratum_core::{CacheError, Result};
use stratum_store::RemoteStore;

/// Deletes a lock key only when it still holds the caller's token, so a lock
/// that expired and was re-taken by another process is never released out
/// from under it.
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Remote store backed by a shared deadpool-redis pool.
///
/// All transport problems are reported as
/// [`CacheError::RemoteUnavailable`]; the engine downgrades them to misses
/// on reads and suppresses them on writes.
#[derive(Clone)]
pub struct RedisRemoteStore {
    pool: Pool,
    release_script: redis::Script,
}

impl RedisRemoteStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            release_script: redis::Script::new(RELEASE_LOCK_SCRIPT),
        }
    }

    /// The underlying pool, for collaborators that need their own commands
    /// (e.g. the pub/sub invalidation publisher).
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::remote_unavailable(e.to_string()))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // Redis rejects PX 0; clamp to the minimum expiry it accepts.
    ttl.as_millis().max(1) as u64
}

fn remote_err(e: redis::RedisError) -> CacheError {
    CacheError::remote_unavailable(e.to_string())
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, full_key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(full_key)
            .await
            .map_err(remote_err)
    }

    async fn set(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(full_key)
            .arg(wire)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(remote_err)
    }

    async fn set_if_absent(&self, full_key: &str, wire: &[u8], ttl: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(full_key)
            .arg(wire)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(remote_err)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, full_key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(full_key).await.map_err(remote_err)?;
        Ok(removed > 0)
    }

    async fn multi_get(&self, full_keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if full_keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        // MGET always replies with an array, also for a single key.
        redis::cmd("MGET")
            .arg(full_keys)
            .query_async::<Vec<Option<Vec<u8>>>>(&mut conn)
            .await
            .map_err(remote_err)
    }

    async fn multi_delete(&self, full_keys: &[String]) -> Result<u64> {
        if full_keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        conn.del::<_, u64>(full_keys).await.map_err(remote_err)
    }

    async fn take_lock(&self, lock_key: &str, token: &str, guard: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(guard))
            .query_async(&mut conn)
            .await
            .map_err(remote_err)?;
        Ok(reply.is_some())
    }

    async fn release_lock(&self, lock_key: &str, token: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let released: u64 = self
            .release_script
            .key(lock_key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(remote_err)?;
        Ok(released == 1)
    }

    async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let mut conn = self.conn().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(remote_err)?;
        if reply != "PONG" {
            return Err(CacheError::remote_unavailable(format!(
                "unexpected PING reply: {reply}"
            )));
        }
        Ok(started.elapsed())
    }
}
