//! Health probes for the cache tiers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;

use stratum_core::full_key;
use stratum_store::{LocalStore, LocalValue, RemoteStore};

/// Overall status of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The probe succeeded.
    Healthy,
    /// The probe succeeded but observed something suspicious.
    Warning,
    /// The probe failed.
    Critical,
    /// The probe has not run or could not determine a status.
    #[default]
    Unknown,
}

/// Result of one probe run.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall status.
    pub status: HealthStatus,
    /// Human-readable summary.
    pub message: String,
    /// How long the probe took, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Probe-specific details.
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthCheck {
    /// Creates a healthy check result.
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: message.into(),
            response_time_ms: None,
            details: HashMap::new(),
        }
    }

    /// Creates a warning check result.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Warning,
            message: message.into(),
            response_time_ms: None,
            details: HashMap::new(),
        }
    }

    /// Creates a critical check result.
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Critical,
            message: message.into(),
            response_time_ms: None,
            details: HashMap::new(),
        }
    }

    /// Attaches the probe's response time.
    #[must_use]
    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time_ms = Some(response_time.as_millis() as u64);
        self
    }

    /// Attaches a probe-specific detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// Returns `true` if the status is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

/// A pluggable health probe.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Stable probe name, used as the report key.
    fn name(&self) -> &'static str;

    /// Runs the probe.
    async fn check(&self) -> HealthCheck;
}

/// Probes the remote tier with a ping.
pub struct RemoteStoreProbe {
    store: Arc<dyn RemoteStore>,
}

impl RemoteStoreProbe {
    /// Creates a probe over the given remote store.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthProbe for RemoteStoreProbe {
    fn name(&self) -> &'static str {
        "remote-store"
    }

    async fn check(&self) -> HealthCheck {
        match self.store.ping().await {
            Ok(latency) => HealthCheck::healthy("remote tier reachable")
                .with_response_time(latency)
                .with_detail("latency_ms", (latency.as_millis() as u64).into()),
            Err(e) => HealthCheck::critical(format!("remote tier unreachable: {e}")),
        }
    }
}

/// Probes the in-process tier with a write-read-delete self test under a
/// reserved key.
pub struct LocalStoreProbe<V: Clone + Send + Sync + 'static> {
    store: Arc<dyn LocalStore<V>>,
    namespace: String,
}

impl<V: Clone + Send + Sync + 'static> LocalStoreProbe<V> {
    /// Creates a probe over the given local store.
    pub fn new(store: Arc<dyn LocalStore<V>>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> HealthProbe for LocalStoreProbe<V> {
    fn name(&self) -> &'static str {
        "local-store"
    }

    async fn check(&self) -> HealthCheck {
        let key = full_key(&self.namespace, "__health__");
        let started = Instant::now();

        // The tombstone marker is the one value every store can hold without
        // the probe having to fabricate a domain value.
        self.store
            .set(&key, LocalValue::Tombstone, Duration::from_secs(5));
        let read_back = self.store.try_get(&key);
        self.store.remove(&key);

        match read_back {
            Some(LocalValue::Tombstone) => {
                HealthCheck::healthy("local tier write-read-delete ok")
                    .with_response_time(started.elapsed())
                    .with_detail("entries", self.store.entry_count().into())
            }
            other => HealthCheck::critical(format!(
                "local tier self test failed: wrote tombstone, read back {}",
                match other {
                    Some(LocalValue::Value(_)) => "a value",
                    Some(LocalValue::Tombstone) => "tombstone",
                    None => "nothing",
                }
            )),
        }
    }
}

/// An ordered collection of probes.
#[derive(Default)]
pub struct ProbeRegistry {
    probes: Vec<Box<dyn HealthProbe>>,
}

impl ProbeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a probe.
    pub fn add(&mut self, probe: Box<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    /// Runs every probe, in registration order.
    pub async fn check_all(&self) -> Vec<(&'static str, HealthCheck)> {
        let mut results = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            results.push((probe.name(), probe.check().await));
        }
        results
    }

    /// Runs every probe and reduces to the worst observed status.
    pub async fn overall(&self) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;
        for (_, check) in self.check_all().await {
            overall = match (overall, check.status) {
                (_, HealthStatus::Critical) | (HealthStatus::Critical, _) => HealthStatus::Critical,
                (_, HealthStatus::Unknown) | (HealthStatus::Unknown, _) => HealthStatus::Unknown,
                (_, HealthStatus::Warning) | (HealthStatus::Warning, _) => HealthStatus::Warning,
                _ => HealthStatus::Healthy,
            };
        }
        overall
    }
}
