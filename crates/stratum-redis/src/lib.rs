//! Redis remote (L2) tier for the Stratum two-level cache.
//!
//! Implements the [`stratum_store::RemoteStore`] contract over a shared
//! deadpool-redis pool, plus the pub/sub plumbing that keeps L1 caches
//! synchronized across instances:
//!
//! - [`RedisRemoteStore`]: get / set / set-if-absent / delete / multi-get /
//!   multi-delete / lock-take / lock-release / ping
//! - [`pool::connect`]: ping-checked construction that reports an unreachable
//!   server as `None` so callers can fall back to local-only mode
//! - [`InvalidationListener`] / [`publish_invalidation`]: cross-instance L1
//!   invalidation

pub mod pool;
pub mod pubsub;
pub mod store;

pub use deadpool_redis::Pool;
pub use pool::{connect, create_pool};
pub use pubsub::{
    INVALIDATION_CHANNEL, InvalidationHandler, InvalidationListener, publish_invalidation,
};
pub use store::RedisRemoteStore;
