//! Cross-process mutual exclusion through the remote tier.
//!
//! A remote lock is a short-lived `lock:{namespace}:{key} -> token` entry
//! written with set-if-absent semantics. The token is a fresh UUID per
//! attempt, and release deletes the entry only when it still holds that
//! token, so a lock that expired under its guard TTL and was re-taken by
//! another process is never stolen back. The guard TTL bounds recovery time
//! when a holder dies mid-section.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use stratum_core::lock_key;
use stratum_store::RemoteStore;

/// Delay between acquisition attempts while polling within the wait budget.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Takes and releases remote locks for one engine's namespace.
pub struct RemoteLockFacility {
    store: Arc<dyn RemoteStore>,
    namespace: String,
    guard_ttl: Duration,
}

impl RemoteLockFacility {
    /// Creates a facility over the given remote store.
    pub fn new(store: Arc<dyn RemoteStore>, namespace: impl Into<String>, guard_ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            guard_ttl,
        }
    }

    /// Attempts to take the lock for a user key, polling until acquired or
    /// the wait budget elapses.
    ///
    /// Transport errors read as not-acquired: the caller degrades to a
    /// lock-free load rather than failing. Returns `None` when the lock was
    /// not obtained.
    pub async fn take(&self, user_key: &str, wait_budget: Duration) -> Option<RemoteLockGuard> {
        let lock_key = lock_key(&self.namespace, user_key);
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait_budget;

        loop {
            match self.store.take_lock(&lock_key, &token, self.guard_ttl).await {
                Ok(true) => {
                    tracing::debug!(key = %lock_key, "Remote lock acquired");
                    return Some(RemoteLockGuard {
                        store: Arc::clone(&self.store),
                        lock_key,
                        token,
                        released: false,
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key = %lock_key, error = %e, "Remote lock attempt failed");
                    return None;
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(key = %lock_key, "Remote lock wait budget exhausted");
                return None;
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL.min(remaining)).await;
        }
    }
}

/// An acquired remote lock.
///
/// Prefer [`release`](Self::release) on every normal exit path. If the guard
/// is dropped without it, typically because the owning future was cancelled,
/// the release is spawned as a detached task; should even that be
/// impossible, the guard TTL still reclaims the lock.
pub struct RemoteLockGuard {
    store: Arc<dyn RemoteStore>,
    lock_key: String,
    token: String,
    released: bool,
}

impl RemoteLockGuard {
    /// Releases the lock, deleting the remote entry only if this guard's
    /// token still owns it.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.store.release_lock(&self.lock_key, &self.token).await {
            tracing::warn!(key = %self.lock_key, error = %e, "Remote lock release failed");
        }
    }
}

impl Drop for RemoteLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let lock_key = mem::take(&mut self.lock_key);
        let token = mem::take(&mut self.token);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = store.release_lock(&lock_key, &token).await {
                    tracing::warn!(key = %lock_key, error = %e, "Deferred remote lock release failed");
                }
            });
        }
    }
}
