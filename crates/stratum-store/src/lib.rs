//! Store and collaborator traits for the Stratum two-level cache.
//!
//! This crate defines the contracts between the cache engine and its
//! collaborators. Backend crates (`stratum-memory`, `stratum-redis`)
//! implement [`LocalStore`] and [`RemoteStore`]; applications implement
//! [`DataSource`] and, optionally, [`RefreshPolicy`].

pub mod traits;
pub mod types;

pub use traits::{DataSource, FixedRefreshPolicy, LocalStore, RefreshPolicy, RemoteStore};
pub use types::{EvictionListener, EvictionReason, LocalValue};
