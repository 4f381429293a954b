//! Shared store types.

use std::sync::Arc;

use stratum_core::CacheStatus;

/// What the in-process tier holds for a key: a domain value or a tombstone.
///
/// The tombstone is a distinct inhabitant, not a domain null: it records
/// that the data source was asked and returned nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalValue<V> {
    /// A cached domain value.
    Value(V),
    /// The in-process tombstone marker.
    Tombstone,
}

impl<V> LocalValue<V> {
    /// Returns `true` if this is the tombstone marker.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }

    /// Returns the domain value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Tombstone => None,
        }
    }

    /// Converts into the read status this entry represents.
    #[must_use]
    pub fn into_status(self) -> CacheStatus<V> {
        match self {
            Self::Value(v) => CacheStatus::Found(v),
            Self::Tombstone => CacheStatus::KnownAbsent,
        }
    }
}

/// Why an entry left the in-process tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// The entry's TTL elapsed.
    Expired,
    /// The store evicted the entry to stay within its bound.
    Capacity,
    /// The entry was overwritten by a newer value for the same key.
    Replaced,
    /// The entry was removed explicitly.
    Explicit,
    /// Any other store-specific reason.
    Other,
}

impl EvictionReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Capacity => "capacity",
            Self::Replaced => "replaced",
            Self::Explicit => "explicit",
            Self::Other => "other",
        }
    }
}

/// Callback invoked by a local store whenever an entry is removed, on every
/// removal path. Receives the full (namespaced) key and the reason.
pub type EvictionListener = Arc<dyn Fn(&str, EvictionReason) + Send + Sync>;
