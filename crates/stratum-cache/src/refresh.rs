//! Background refresh bookkeeping.
//!
//! The scheduler only tracks *when* each key is due; the engine's refresh
//! path (driven by the tick loop in [`crate::engine`]) decides *what* a
//! refresh does. Records live in memory only and exist only while the
//! corresponding L1 entry does: the eviction listener untracks on every
//! removal except replacement, and the refresh path untracks any key whose
//! entry has meanwhile disappeared.
//!
//! Note that a successful refresh rewrites the entry through the put path
//! and therefore restarts its TTLs: under steady refresh an entry lives
//! until eviction, invalidation, or a refresh failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use stratum_store::RefreshPolicy;

/// Cadence of the refresh tick loop.
pub(crate) const REFRESH_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct RefreshRecord {
    interval: Duration,
    next_due: Instant,
}

/// Tracks which keys are due for proactive revalidation.
pub(crate) struct RefreshScheduler {
    records: DashMap<String, RefreshRecord>,
    default_interval: Duration,
    policy: Option<Arc<dyn RefreshPolicy>>,
}

impl RefreshScheduler {
    pub fn new(default_interval: Duration, policy: Option<Arc<dyn RefreshPolicy>>) -> Self {
        Self {
            records: DashMap::new(),
            default_interval,
            policy,
        }
    }

    fn interval_for(&self, key: &str) -> Duration {
        self.policy
            .as_ref()
            .and_then(|policy| policy.interval_for(key))
            .unwrap_or(self.default_interval)
    }

    /// Starts or restarts tracking for a key. The next refresh is due one
    /// interval from now.
    pub fn track(&self, key: &str) {
        let interval = self.interval_for(key);
        self.records.insert(
            key.to_string(),
            RefreshRecord {
                interval,
                next_due: Instant::now() + interval,
            },
        );
    }

    /// Stops tracking a key. A no-op when untracked.
    pub fn untrack(&self, key: &str) {
        self.records.remove(key);
    }

    /// Snapshot of the keys whose refresh is due.
    pub fn due_keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.records
            .iter()
            .filter(|entry| entry.value().next_due <= now)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Pushes a key's next due time one interval out.
    pub fn mark_refreshed(&self, key: &str) {
        if let Some(mut entry) = self.records.get_mut(key) {
            let interval = entry.interval;
            entry.next_due = Instant::now() + interval;
        }
    }

    /// Number of tracked keys.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// Drops every record. Used on engine shutdown.
    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_store::FixedRefreshPolicy;

    #[test]
    fn test_track_and_due() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(20), None);
        scheduler.track("a");
        assert_eq!(scheduler.tracked_count(), 1);
        assert!(scheduler.due_keys().is_empty());

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(scheduler.due_keys(), vec!["a".to_string()]);
    }

    #[test]
    fn test_mark_refreshed_pushes_out_due_time() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(20), None);
        scheduler.track("a");
        std::thread::sleep(Duration::from_millis(40));
        assert!(!scheduler.due_keys().is_empty());

        scheduler.mark_refreshed("a");
        assert!(scheduler.due_keys().is_empty());
    }

    #[test]
    fn test_untrack_removes_record() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(1), None);
        scheduler.track("a");
        scheduler.untrack("a");
        std::thread::sleep(Duration::from_millis(5));
        assert!(scheduler.due_keys().is_empty());
        assert_eq!(scheduler.tracked_count(), 0);
    }

    #[test]
    fn test_track_is_upsert() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(10), None);
        scheduler.track("a");
        std::thread::sleep(Duration::from_millis(20));
        // Re-tracking resets the due time.
        scheduler.track("a");
        assert!(scheduler.due_keys().is_empty());
        assert_eq!(scheduler.tracked_count(), 1);
    }

    #[test]
    fn test_policy_overrides_default_interval() {
        let policy = Arc::new(FixedRefreshPolicy(Duration::from_secs(3600)));
        let scheduler = RefreshScheduler::new(Duration::from_millis(1), Some(policy));
        scheduler.track("a");
        std::thread::sleep(Duration::from_millis(10));
        // With the hour-long policy interval, nothing is due yet.
        assert!(scheduler.due_keys().is_empty());
    }

    #[test]
    fn test_mark_refreshed_on_untracked_key_is_noop() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(10), None);
        scheduler.mark_refreshed("ghost");
        assert_eq!(scheduler.tracked_count(), 0);
    }

    #[test]
    fn test_clear() {
        let scheduler = RefreshScheduler::new(Duration::from_millis(10), None);
        scheduler.track("a");
        scheduler.track("b");
        scheduler.clear();
        assert_eq!(scheduler.tracked_count(), 0);
    }
}
