//! Metrics recording for the cache engine.
//!
//! Emits through the `metrics` facade; the application installs whatever
//! exporter it uses. Recording honors the engine's
//! [`TelemetryConfig`](stratum_core::TelemetryConfig): per-key labels only
//! when `record_keys` is set (high cardinality; debugging, not steady
//! state), value-size histograms only when `record_value_size` is set,
//! hot-path counters thinned by `sampling_ratio`, and `custom_tags` appended
//! to every emission.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{Label, counter, histogram};

use stratum_core::{ErrorCategory, TelemetryConfig};
use stratum_store::EvictionReason;

/// Metric names as constants for consistency.
pub mod names {
    /// Read hits, labelled by tier (`l1`, `l2`).
    pub const HITS_TOTAL: &str = "stratum_cache_hits_total";
    /// Reads that missed every tier.
    pub const MISSES_TOTAL: &str = "stratum_cache_misses_total";
    /// Data-source loads, labelled by outcome (`value`, `absent`, `error`).
    pub const LOADS_TOTAL: &str = "stratum_cache_loads_total";
    /// Cache writes, labelled by tier.
    pub const WRITES_TOTAL: &str = "stratum_cache_writes_total";
    /// Explicit invalidations.
    pub const INVALIDATIONS_TOTAL: &str = "stratum_cache_invalidations_total";
    /// L1 removals, labelled by eviction reason.
    pub const EVICTIONS_TOTAL: &str = "stratum_cache_evictions_total";
    /// Lock waits that exhausted their budget, labelled by scope
    /// (`in_process`, `remote`).
    pub const LOCK_TIMEOUTS_TOTAL: &str = "stratum_cache_lock_timeouts_total";
    /// Cache-layer errors absorbed to preserve availability, labelled by
    /// error category.
    pub const ABSORBED_ERRORS_TOTAL: &str = "stratum_cache_absorbed_errors_total";
    /// Background refresh attempts, labelled by outcome.
    pub const REFRESH_TOTAL: &str = "stratum_cache_refresh_total";
    /// Encoded value sizes in bytes, recorded when `record_value_size` is on.
    pub const VALUE_SIZE_BYTES: &str = "stratum_cache_value_size_bytes";
}

/// Per-engine metrics recorder.
#[derive(Clone)]
pub(crate) struct Telemetry {
    config: TelemetryConfig,
    namespace: String,
    /// Record every nth hot-path event; derived from `sampling_ratio`.
    sample_stride: u64,
    sample_counter: Arc<AtomicU64>,
}

impl Telemetry {
    pub fn new(namespace: impl Into<String>, config: TelemetryConfig) -> Self {
        let sample_stride = if config.sampling_ratio >= 1.0 {
            1
        } else if config.sampling_ratio <= 0.0 {
            u64::MAX
        } else {
            (1.0 / config.sampling_ratio).round() as u64
        };
        Self {
            config,
            namespace: namespace.into(),
            sample_stride,
            sample_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    fn should_sample(&self) -> bool {
        match self.sample_stride {
            1 => true,
            u64::MAX => false,
            stride => self.sample_counter.fetch_add(1, Ordering::Relaxed) % stride == 0,
        }
    }

    fn labels(&self, key: Option<&str>, extra: &[(&'static str, &str)]) -> Vec<Label> {
        let mut labels = Vec::with_capacity(2 + extra.len() + self.config.custom_tags.len());
        labels.push(Label::new("namespace", self.namespace.clone()));
        for (name, value) in extra {
            labels.push(Label::new(*name, value.to_string()));
        }
        if self.config.record_keys {
            if let Some(key) = key {
                labels.push(Label::new("key", key.to_string()));
            }
        }
        for (name, value) in &self.config.custom_tags {
            labels.push(Label::new(name.clone(), value.clone()));
        }
        labels
    }

    pub fn record_hit(&self, tier: &'static str, key: &str) {
        if !self.should_sample() {
            return;
        }
        let labels = self.labels(Some(key), &[("tier", tier)]);
        counter!(names::HITS_TOTAL, labels).increment(1);
    }

    pub fn record_miss(&self, key: &str) {
        if !self.should_sample() {
            return;
        }
        let labels = self.labels(Some(key), &[]);
        counter!(names::MISSES_TOTAL, labels).increment(1);
    }

    pub fn record_load(&self, outcome: &'static str) {
        let labels = self.labels(None, &[("outcome", outcome)]);
        counter!(names::LOADS_TOTAL, labels).increment(1);
    }

    pub fn record_write(&self, tier: &'static str) {
        if !self.should_sample() {
            return;
        }
        let labels = self.labels(None, &[("tier", tier)]);
        counter!(names::WRITES_TOTAL, labels).increment(1);
    }

    pub fn record_invalidation(&self) {
        let labels = self.labels(None, &[]);
        counter!(names::INVALIDATIONS_TOTAL, labels).increment(1);
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        let labels = self.labels(None, &[("reason", reason.as_str())]);
        counter!(names::EVICTIONS_TOTAL, labels).increment(1);
    }

    pub fn record_lock_timeout(&self, scope: &'static str) {
        let labels = self.labels(None, &[("scope", scope)]);
        counter!(names::LOCK_TIMEOUTS_TOTAL, labels).increment(1);
    }

    pub fn record_absorbed(&self, category: ErrorCategory) {
        let category = category.to_string();
        let labels = self.labels(None, &[("category", category.as_str())]);
        counter!(names::ABSORBED_ERRORS_TOTAL, labels).increment(1);
    }

    pub fn record_refresh(&self, outcome: &'static str) {
        let labels = self.labels(None, &[("outcome", outcome)]);
        counter!(names::REFRESH_TOTAL, labels).increment(1);
    }

    pub fn record_value_size(&self, bytes: usize) {
        if !self.config.record_value_size {
            return;
        }
        let labels = self.labels(None, &[]);
        histogram!(names::VALUE_SIZE_BYTES, labels).record(bytes as f64);
    }
}
