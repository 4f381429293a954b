//! Typed view over the remote tier.
//!
//! The facade owns sentinel translation and the absorb-into-miss policy:
//! transport errors and undecodable payloads degrade reads to misses and
//! writes to no-ops, each logged and counted. Only encode failures surface,
//! since those are caller bugs rather than infrastructure problems.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stratum_core::{Codec, full_key};
use stratum_store::RemoteStore;

use crate::telemetry::Telemetry;

/// What the remote tier holds for a key, after sentinel translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemoteValue<V> {
    /// A decoded domain value.
    Value(V),
    /// The reserved tombstone sentinel.
    Tombstone,
    /// Nothing: absent, unreachable, or undecodable.
    Missing,
}

/// L2 facade: namespacing, codec application, and error absorption.
pub(crate) struct RemoteFacade<C: Codec> {
    store: Arc<dyn RemoteStore>,
    codec: Arc<C>,
    namespace: String,
    telemetry: Telemetry,
}

impl<C: Codec> RemoteFacade<C> {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        codec: Arc<C>,
        namespace: impl Into<String>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            store,
            codec,
            namespace: namespace.into(),
            telemetry,
        }
    }

    fn full(&self, user_key: &str) -> String {
        full_key(&self.namespace, user_key)
    }

    fn translate<V: DeserializeOwned>(&self, user_key: &str, wire: Vec<u8>) -> RemoteValue<V> {
        if self.codec.is_tombstone(&wire) {
            return RemoteValue::Tombstone;
        }
        match self.codec.decode(&wire) {
            Ok(value) => RemoteValue::Value(value),
            Err(e) => {
                tracing::warn!(key = %user_key, error = %e, "Undecodable remote entry, treating as miss");
                self.telemetry.record_absorbed(e.category());
                RemoteValue::Missing
            }
        }
    }

    pub async fn get<V: DeserializeOwned>(&self, user_key: &str) -> RemoteValue<V> {
        match self.store.get(&self.full(user_key)).await {
            Ok(Some(wire)) => self.translate(user_key, wire),
            Ok(None) => RemoteValue::Missing,
            Err(e) => {
                tracing::warn!(key = %user_key, error = %e, "Remote get failed, treating as miss");
                self.telemetry.record_absorbed(e.category());
                RemoteValue::Missing
            }
        }
    }

    /// Reads many keys in one round trip; `result[i]` corresponds to
    /// `user_keys[i]`. A transport error degrades the whole batch to misses.
    pub async fn multi_get<V: DeserializeOwned>(&self, user_keys: &[String]) -> Vec<RemoteValue<V>> {
        let full_keys: Vec<String> = user_keys.iter().map(|key| self.full(key)).collect();
        match self.store.multi_get(&full_keys).await {
            Ok(wires) => user_keys
                .iter()
                .zip(wires)
                .map(|(key, wire)| match wire {
                    Some(wire) => self.translate(key, wire),
                    None => RemoteValue::Missing,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Remote multi-get failed, treating as misses");
                self.telemetry.record_absorbed(e.category());
                user_keys.iter().map(|_| RemoteValue::Missing).collect()
            }
        }
    }

    /// Encodes and writes a value.
    ///
    /// # Errors
    ///
    /// Returns the codec's error when the value cannot be encoded. Transport
    /// errors are absorbed.
    pub async fn set_value<V: Serialize>(
        &self,
        user_key: &str,
        value: &V,
        ttl: Duration,
    ) -> stratum_core::Result<()> {
        let wire = self.codec.encode(value)?;
        self.telemetry.record_value_size(wire.len());
        if let Err(e) = self.store.set(&self.full(user_key), &wire, ttl).await {
            tracing::warn!(key = %user_key, error = %e, "Remote set failed, continuing with L1 only");
            self.telemetry.record_absorbed(e.category());
        }
        Ok(())
    }

    /// Writes the tombstone sentinel. Transport errors are absorbed.
    pub async fn set_tombstone(&self, user_key: &str, ttl: Duration) {
        let sentinel = self.codec.tombstone().to_vec();
        if let Err(e) = self.store.set(&self.full(user_key), &sentinel, ttl).await {
            tracing::warn!(key = %user_key, error = %e, "Remote tombstone set failed");
            self.telemetry.record_absorbed(e.category());
        }
    }

    /// Encodes and writes a value only if the key is absent. Returns whether
    /// the write took effect; a transport error reads as "took no effect".
    pub async fn set_value_if_absent<V: Serialize>(
        &self,
        user_key: &str,
        value: &V,
        ttl: Duration,
    ) -> stratum_core::Result<bool> {
        let wire = self.codec.encode(value)?;
        self.telemetry.record_value_size(wire.len());
        match self
            .store
            .set_if_absent(&self.full(user_key), &wire, ttl)
            .await
        {
            Ok(applied) => Ok(applied),
            Err(e) => {
                tracing::warn!(key = %user_key, error = %e, "Remote set-if-absent failed");
                self.telemetry.record_absorbed(e.category());
                Ok(false)
            }
        }
    }

    /// Deletes a key. Returns whether the remote tier reported a deletion; a
    /// transport error reads as `false`.
    pub async fn delete(&self, user_key: &str) -> bool {
        match self.store.delete(&self.full(user_key)).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(key = %user_key, error = %e, "Remote delete failed");
                self.telemetry.record_absorbed(e.category());
                false
            }
        }
    }

    /// Deletes many keys in one round trip. Returns the number removed; a
    /// transport error reads as zero.
    pub async fn multi_delete(&self, user_keys: &[String]) -> u64 {
        let full_keys: Vec<String> = user_keys.iter().map(|key| self.full(key)).collect();
        match self.store.multi_delete(&full_keys).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Remote multi-delete failed");
                self.telemetry.record_absorbed(e.category());
                0
            }
        }
    }
}
