//! Resource error types.

use std::path::PathBuf;

/// Errors raised while reading or following a log file.
#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    /// Reading the file content failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the file metadata failed.
    #[error("Failed to get size of {path}: {source}")]
    Size {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The follower for the file could not be started.
    #[error("Failed to follow {path}: {reason}")]
    Follow { path: PathBuf, reason: String },

    /// The resource was closed and accepts no more listeners.
    #[error("Resource closed: {0}")]
    Closed(PathBuf),
}

impl ResourceError {
    /// The file the error is about.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. }
            | Self::Size { path, .. }
            | Self::Follow { path, .. }
            | Self::Closed(path) => path,
        }
    }
}
