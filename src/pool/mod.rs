//! Shared, usage-aware cache of live resources.

mod error;
mod resource_pool;

pub use error::{DisposalError, PoolError};
pub use resource_pool::{Disposable, ResourcePool};
