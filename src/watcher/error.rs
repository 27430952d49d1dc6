//! Watcher error types.

use std::path::PathBuf;

use crate::resource::ResourceError;

/// Errors raised by a [`Watcher`](super::Watcher).
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    /// The resource is already watched by this watcher.
    #[error("Already watching {0}")]
    AlreadyWatching(PathBuf),

    /// The resource is not watched by this watcher.
    #[error("Not watching {0}")]
    NotWatching(PathBuf),

    /// Reading or subscribing to the resource failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
