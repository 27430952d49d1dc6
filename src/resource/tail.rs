//! The two ways of following a growing file.
//!
//! Both produce raw appended bytes on a channel; line splitting happens in
//! [`LogContent`](super::LogContent).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::backend::{Follower, TailOptions};
use super::error::ResourceError;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads the bytes appended to a file since the last read.
#[derive(Debug)]
pub(crate) struct AppendReader {
    path: PathBuf,
    offset: u64,
}

impl AppendReader {
    /// Start reading at the current end of the file. A missing file starts at 0.
    pub(crate) fn at_end(path: PathBuf) -> Self {
        let offset = std::fs::metadata(&path).map_or(0, |metadata| metadata.len());
        Self { path, offset }
    }

    #[cfg(test)]
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Read everything appended since the previous call.
    ///
    /// A file that shrank was truncated or replaced: reading restarts at 0.
    /// A missing file yields nothing and is read from the start once it
    /// reappears.
    pub(crate) async fn read_appended(&mut self) -> std::io::Result<Vec<u8>> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.offset = 0;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let file_len = file.metadata().await?.len();

        if file_len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "File truncated, resetting offset to 0"
            );
            self.offset = 0;
        }

        if file_len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(std::io::SeekFrom::Start(self.offset)).await?;
        let mut bytes = Vec::new();
        file.take(file_len - self.offset)
            .read_to_end(&mut bytes)
            .await?;
        self.offset += bytes.len() as u64;

        Ok(bytes)
    }
}

/// Follow `path` with file-system notifications backed by polling.
pub(super) fn follow_native(
    path: &Path,
    options: &TailOptions,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Follower {
    let path = path.to_path_buf();
    let (wake_tx, mut wake_rx) = mpsc::unbounded_channel::<()>();

    let file_name = path.file_name().map(ToOwned::to_owned);
    let debouncer = new_debouncer(options.debounce, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let touched = events.iter().any(|event| {
                    event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(ToOwned::to_owned) == file_name)
                });
                if touched {
                    let _ = wake_tx.send(());
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = %error, "File watcher error");
                }
            }
        }
    });

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // Without notifications the poll interval alone drives reads.
    let debouncer = match debouncer {
        Ok(mut debouncer) => match debouncer.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => Some(debouncer),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot watch directory, polling only");
                None
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot create file watcher, polling only");
            None
        }
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let poll_interval = options.poll_interval;

    let mut reader = AppendReader::at_end(path.clone());
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(path = %path.display(), offset = reader.offset, "Native follower started");

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                Some(()) = wake_rx.recv() => {}
                _ = interval.tick() => {}
            }

            match reader.read_appended().await {
                Ok(bytes) if bytes.is_empty() => {}
                Ok(bytes) => {
                    if tx.send(bytes).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read appended content");
                }
            }
        }

        drop(debouncer);
        tracing::debug!(path = %path.display(), "Native follower stopped");
    });

    Follower::new(cancel, task)
}

/// Follow `path` by streaming the stdout of `tail -F -n 0 <path>`.
pub(super) fn follow_process(
    path: &Path,
    options: &TailOptions,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<Follower, ResourceError> {
    let follow_error = |reason: String| ResourceError::Follow {
        path: path.to_path_buf(),
        reason,
    };

    let mut child = Command::new(&options.tail_binary)
        .args(["-F", "-n", "0"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| follow_error(format!("{}: {e}", options.tail_binary)))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| follow_error("tail stdout not captured".to_string()))?;

    let path = path.to_path_buf();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        tracing::debug!(path = %path.display(), pid = ?child.id(), "Tail process started");
        let mut buf = vec![0_u8; READ_CHUNK_SIZE];

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                read = stdout.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::warn!(path = %path.display(), "Tail process closed its output");
                        break;
                    }
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to read tail output");
                        break;
                    }
                },
            }
        }

        if let Err(e) = child.kill().await {
            tracing::debug!(path = %path.display(), error = %e, "Tail process already gone");
        }
        tracing::debug!(path = %path.display(), "Tail process stopped");
    });

    Ok(Follower::new(cancel, task))
}
