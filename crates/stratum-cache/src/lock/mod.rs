//! Stampede suppression locks: per-key in-process slots and short-lived
//! remote lock tokens.

pub mod keyed;
pub mod remote;

pub use keyed::{KeyedLockGuard, KeyedLockTable};
pub use remote::{LOCK_POLL_INTERVAL, RemoteLockFacility, RemoteLockGuard};
