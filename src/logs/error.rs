//! Log service error types.

use std::path::PathBuf;

use crate::collection::CollectionError;
use crate::pool::PoolError;
use crate::resource::ResourceError;
use crate::watcher::WatchError;

/// Errors raised by the [`LogService`](super::LogService).
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    /// The path is not on the allow-list.
    #[error("Log file not allowed: {0}")]
    NotAllowed(PathBuf),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}
