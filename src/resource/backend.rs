//! Tail backend selection and the follower handle.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::ResourceError;
use super::tail;
use crate::lines::DEFAULT_EOL;

/// How appended file content is picked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailBackend {
    /// File-system notifications plus periodic polling, read in-process.
    #[default]
    Native,
    /// An external `tail -F` process.
    Process,
}

impl std::str::FromStr for TailBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "process" => Ok(Self::Process),
            other => Err(format!("unknown tail backend: {other}")),
        }
    }
}

/// Settings for following files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOptions {
    pub backend: TailBackend,
    pub eol: String,
    /// Native backend: how often to check the file even without notifications.
    pub poll_interval: Duration,
    /// Native backend: notification debounce window.
    pub debounce: Duration,
    /// Process backend: the `tail` executable.
    pub tail_binary: String,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            backend: TailBackend::Native,
            eol: DEFAULT_EOL.to_string(),
            poll_interval: Duration::from_millis(1000),
            debounce: Duration::from_millis(50),
            tail_binary: "tail".to_string(),
        }
    }
}

/// A running background follower. Dropping it stops following.
#[derive(Debug)]
pub(crate) struct Follower {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Follower {
    pub(crate) fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Start following `path`, sending appended raw bytes to `tx`.
    ///
    /// Only content appended after this call is reported.
    pub(crate) fn spawn(
        path: &Path,
        options: &TailOptions,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<Self, ResourceError> {
        match options.backend {
            TailBackend::Native => Ok(tail::follow_native(path, options, tx)),
            TailBackend::Process => tail::follow_process(path, options, tx),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}
