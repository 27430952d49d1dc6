//! Pool error types.

use std::path::PathBuf;

use crate::resource::ResourceError;

/// Errors raised by a [`ResourcePool`](super::ResourcePool).
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// The resource is not the instance this pool caches for its path.
    #[error("Resource not owned by this pool: {0}")]
    ResourceNotOwned(PathBuf),

    /// The factory failed to build a resource.
    #[error("Failed to create resource for {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: ResourceError,
    },
}

/// A failed attempt to dispose of one resource.
#[derive(thiserror::Error, Debug)]
#[error("Failed to dispose of {path}: {source}")]
pub struct DisposalError {
    pub path: PathBuf,
    #[source]
    pub source: PoolError,
}
