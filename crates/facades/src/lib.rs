//! Reusable, poolable request façades which expose strongly-typed views
//! over a dynamic `features::Features` collection.
//!
//! Façades memoize their feature lookups in a FeatureReferences cache
//! that is invalidated lazily whenever the collection's revision changes,
//! and are rebound to a new collection per request via Reusable.
use features::Features;
use std::sync::Arc;

mod connection_info;
mod header;
mod pool;
mod references;
mod upgrade_manager;

pub use connection_info::ConnectionInfo;
pub use header::split_values;
pub use pool::{Pool, PoolStats};
pub use references::{FeatureReferences, Resolve, Slot};
pub use upgrade_manager::UpgradeManager;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("façade is not attached to a feature collection")]
    Detached,
    #[error("{0} not supported on this connection")]
    Unsupported(&'static str),
    #[error(transparent)]
    Feature(#[from] features::Error),
}
pub type Result<T> = std::result::Result<T, Error>;

/// Reusable is implemented by façades which may be drawn from a Pool,
/// bound to the Features of a request, and then reset for the next one.
pub trait Reusable: Default {
    /// Bind to `features`, discarding any prior binding.
    fn initialize(&mut self, features: Arc<Features>);
    /// Detach, leaving the façade in its never-initialized state.
    fn uninitialize(&mut self);
}
