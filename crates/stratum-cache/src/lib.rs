//! Stratum: a two-level caching library.
//!
//! ## Architecture
//!
//! - **L1 (in-process)**: bounded moka store, sub-microsecond lookups,
//!   per-instance
//! - **L2 (Redis)**: shared across instances, millisecond lookups, the
//!   consistency anchor
//! - **Data source**: the slow authority both tiers front
//!
//! ```text
//! get_or_load(key) → L1 → L2 → source
//!                     ↓     ↓      ↓
//!                  <1µs   ~ms   locks held: per-key slot + remote token
//! ```
//!
//! ## What the engine does for you
//!
//! - **Stampede suppression**: concurrent misses on one key collapse to a
//!   single data-source load, via per-key in-process locking within the
//!   process, a short-lived Redis lock token across processes, and
//!   double/triple re-checks under those locks.
//! - **Negative caching**: a data source that returns nothing can be cached
//!   as a tombstone, so known-missing keys stop hammering it. Reads report
//!   this as [`CacheStatus::KnownAbsent`], distinct from "not cached".
//! - **Background refresh**: tracked entries are revalidated on a periodic
//!   tick from L2 (picking up other instances' writes) or the source.
//! - **Batching**: multi-key read, load, and invalidate paths that spend one
//!   L2 round trip instead of N.
//! - **Graceful degradation**: an unreachable Redis downgrades reads to L1,
//!   suppresses remote writes, and never fails a caller.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratum_cache::{CacheStatus, StratumCache};
//!
//! let cache: StratumCache<Product> = StratumCache::builder("products")
//!     .source(Arc::new(ProductSource::new(db)))
//!     .build()
//!     .await?;
//!
//! match cache.get_or_load(&42u64, None).await? {
//!     CacheStatus::Found(product) => println!("{product:?}"),
//!     CacheStatus::KnownAbsent => println!("no such product"),
//!     CacheStatus::NotFound => unreachable!("negative caching is on"),
//! }
//! ```

pub mod builder;
pub mod engine;
mod facade;
pub mod health;
pub mod hooks;
pub mod lock;
mod refresh;
pub mod telemetry;

pub use builder::StratumCacheBuilder;
pub use engine::{CacheStats, CacheValue, InvalidationPublisher, StratumCache};
pub use health::{HealthCheck, HealthProbe, HealthStatus, ProbeRegistry};
pub use hooks::EventHooks;
pub use lock::{KeyedLockGuard, KeyedLockTable, RemoteLockFacility, RemoteLockGuard};

// The pieces callers need from the sibling crates, re-exported so most
// applications depend on this crate alone.
pub use stratum_core::{
    CacheConfig, CacheError, CacheStatus, Codec, ErrorCategory, JsonCodec, KeyEncode,
    MessagePackCodec, Result,
};
pub use stratum_memory::MemoryLocalStore;
pub use stratum_redis::RedisRemoteStore;
pub use stratum_store::{
    DataSource, EvictionReason, FixedRefreshPolicy, LocalStore, LocalValue, RefreshPolicy,
    RemoteStore,
};
