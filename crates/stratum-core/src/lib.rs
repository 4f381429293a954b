//! Core types for the Stratum two-level cache.
//!
//! This crate carries everything the other Stratum crates agree on: the
//! error taxonomy, the three-valued [`CacheStatus`] read result, key encoding
//! and namespacing, the codec contract with its reserved tombstone sentinel,
//! and the configuration surface.

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod status;

pub use codec::{Codec, JsonCodec, MessagePackCodec, TOMBSTONE_SENTINEL};
pub use config::{
    CacheConfig, LockConfig, NegativeCacheConfig, RefreshConfig, RemoteConfig, TelemetryConfig,
};
pub use error::{CacheError, ErrorCategory, Result};
pub use key::{KeyEncode, full_key, lock_key, user_key};
pub use status::CacheStatus;
