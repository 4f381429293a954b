//! Typed views over the two storage tiers.

pub(crate) mod local;
pub(crate) mod remote;

pub(crate) use local::LocalFacade;
pub(crate) use remote::{RemoteFacade, RemoteValue};
