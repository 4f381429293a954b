//! Configuration surface for the cache engine.
//!
//! All duration-valued options are plain `u64` milliseconds in the serialized
//! form (matching how they arrive from config files) with `Duration` accessor
//! methods for use in code. Every struct deserializes with full defaults, so
//! an empty config section yields a working tiered cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the in-process tier (L1) is enabled.
    pub use_local_tier: bool,
    /// Whether the remote tier (L2) is enabled.
    pub use_remote_tier: bool,
    /// Maximum number of entries held in L1.
    pub local_capacity: u64,
    /// Default L1 TTL in milliseconds. L1 TTLs are additionally clamped so
    /// they never exceed the TTL written to L2 for the same key.
    pub default_local_ttl_ms: u64,
    /// Default L2 TTL in milliseconds, used when a write supplies none.
    pub default_remote_ttl_ms: u64,
    /// Remote tier connection settings.
    pub remote: RemoteConfig,
    /// Negative caching (tombstone) settings.
    pub negative_cache: NegativeCacheConfig,
    /// Lock settings for stampede suppression.
    pub locks: LockConfig,
    /// Background refresh settings.
    pub refresh: RefreshConfig,
    /// Telemetry recording settings.
    pub telemetry: TelemetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_local_tier: true,
            use_remote_tier: true,
            local_capacity: 100_000,
            default_local_ttl_ms: 300_000,
            default_remote_ttl_ms: 3_600_000,
            remote: RemoteConfig::default(),
            negative_cache: NegativeCacheConfig::default(),
            locks: LockConfig::default(),
            refresh: RefreshConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Default L1 TTL as a `Duration`.
    #[must_use]
    pub fn default_local_ttl(&self) -> Duration {
        Duration::from_millis(self.default_local_ttl_ms)
    }

    /// Default L2 TTL as a `Duration`.
    #[must_use]
    pub fn default_remote_ttl(&self) -> Duration {
        Duration::from_millis(self.default_remote_ttl_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] for values that cannot work:
    /// zero TTLs, a zero remote-lock guard, a sampling ratio outside `[0, 1]`,
    /// or a remote tier enabled without a connection URL.
    pub fn validate(&self) -> Result<()> {
        if self.use_local_tier && self.default_local_ttl_ms == 0 {
            return Err(CacheError::configuration("default_local_ttl_ms must be > 0"));
        }
        if self.use_remote_tier && self.default_remote_ttl_ms == 0 {
            return Err(CacheError::configuration(
                "default_remote_ttl_ms must be > 0",
            ));
        }
        if self.use_remote_tier && self.remote.url.is_empty() {
            return Err(CacheError::configuration(
                "remote tier enabled but remote.url is empty",
            ));
        }
        if self.locks.remote && self.locks.remote_guard_ms == 0 {
            return Err(CacheError::configuration(
                "locks.remote_guard_ms must be > 0 when remote locking is enabled",
            ));
        }
        if self.negative_cache.enabled && self.negative_cache.ttl_ms == 0 {
            return Err(CacheError::configuration(
                "negative_cache.ttl_ms must be > 0 when negative caching is enabled",
            ));
        }
        if self.refresh.enabled && self.refresh.default_interval_ms == 0 {
            return Err(CacheError::configuration(
                "refresh.default_interval_ms must be > 0 when refresh is enabled",
            ));
        }
        if !(0.0..=1.0).contains(&self.telemetry.sampling_ratio) {
            return Err(CacheError::configuration(
                "telemetry.sampling_ratio must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Remote tier (Redis) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Logical database index.
    pub database: u32,
    /// Connection pool size.
    pub pool_size: usize,
    /// Pool wait / connect timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            database: 0,
            pool_size: 8,
            timeout_ms: 5_000,
        }
    }
}

impl RemoteConfig {
    /// Pool timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Negative caching (tombstone) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeCacheConfig {
    /// Whether misses against the data source are cached as tombstones.
    pub enabled: bool,
    /// Tombstone TTL in milliseconds.
    pub ttl_ms: u64,
}

impl Default for NegativeCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 30_000,
        }
    }
}

impl NegativeCacheConfig {
    /// Tombstone TTL as a `Duration`.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Lock settings for stampede suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Whether the per-key in-process lock is taken on load-through.
    pub in_process: bool,
    /// Whether the remote (cross-process) lock is taken on load-through.
    pub remote: bool,
    /// Maximum time to wait for either lock before degrading to the unlocked
    /// path, in milliseconds.
    pub wait_budget_ms: u64,
    /// TTL placed on the remote lock entry, in milliseconds. Bounds recovery
    /// time if the holder dies mid-section.
    pub remote_guard_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            in_process: true,
            remote: false,
            wait_budget_ms: 3_000,
            remote_guard_ms: 10_000,
        }
    }
}

impl LockConfig {
    /// Lock wait budget as a `Duration`.
    #[must_use]
    pub fn wait_budget(&self) -> Duration {
        Duration::from_millis(self.wait_budget_ms)
    }

    /// Remote lock guard TTL as a `Duration`.
    #[must_use]
    pub fn remote_guard(&self) -> Duration {
        Duration::from_millis(self.remote_guard_ms)
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether entries are proactively revalidated in the background.
    pub enabled: bool,
    /// Default per-key refresh interval in milliseconds, used when no
    /// refresh policy supplies one.
    pub default_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_interval_ms: 60_000,
        }
    }
}

impl RefreshConfig {
    /// Default refresh interval as a `Duration`.
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

/// Telemetry recording settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether per-key labels are attached to metrics. High cardinality;
    /// intended for debugging, not steady-state production.
    pub record_keys: bool,
    /// Whether encoded value sizes are recorded as a histogram.
    pub record_value_size: bool,
    /// Fraction of hot-path events recorded, in `[0, 1]`.
    pub sampling_ratio: f64,
    /// Extra labels attached to every metric emitted by this engine.
    pub custom_tags: Vec<(String, String)>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            record_keys: false,
            record_value_size: false,
            sampling_ratio: 1.0,
            custom_tags: Vec::new(),
        }
    }
}
