//! Process spawning and signalling.
//!
//! Executions never touch `tokio::process` directly; they consume a
//! [`ProcessHandle`] produced by a [`ProcessSpawner`]. The default spawner
//! is [`TokioSpawner`]; tests build handles from in-memory pipes.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::AsyncRead;
use tokio::process::Command;

use super::state::ExecutionStatus;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The program was not found.
    #[error("Program not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io {
                program: program.to_string(),
                source: err,
            },
        }
    }
}

/// Signals an execution can send to its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Graceful interrupt (SIGINT).
    Interrupt,
    /// Forceful kill (SIGKILL).
    Kill,
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Kill => "SIGKILL",
        })
    }
}

/// How a process ended. At least one of `code` and `signal` is set for a
/// real process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl ProcessExit {
    #[must_use]
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    #[must_use]
    pub fn with_signal(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    /// The status an execution ends in: success only on exit code 0.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        if self.code == Some(0) {
            ExecutionStatus::Succeeded
        } else {
            ExecutionStatus::Failed
        }
    }

    /// The diagnostic line appended to an execution's output on close.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match (self.code, self.signal.as_deref()) {
            (Some(code), None) => format!("Process exited with code {code}"),
            (None, Some(signal)) => format!("Process was terminated by signal {signal}"),
            (Some(code), Some(signal)) => {
                format!("Process exited with code {code} after signal {signal}")
            }
            (None, None) => "Process exited".to_string(),
        }
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: exit_signal_name(status),
        }
    }
}

#[cfg(unix)]
fn exit_signal_name(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|number| {
        nix::sys::signal::Signal::try_from(number)
            .map_or_else(|_| format!("signal {number}"), |s| s.as_str().to_string())
    })
}

#[cfg(not(unix))]
fn exit_signal_name(_status: ExitStatus) -> Option<String> {
    None
}

/// Sends signals to a live process.
pub trait ProcessControl: Send + Sync + fmt::Debug {
    /// Deliver `signal` to the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses the signal or the process is gone.
    fn signal(&self, signal: ProcessSignal) -> std::io::Result<()>;
}

/// A readable output pipe of a process.
pub type ProcessOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Everything an execution needs from a spawned process.
pub struct ProcessHandle {
    /// OS process id, when known.
    pub pid: Option<u32>,
    pub stdout: Option<ProcessOutput>,
    pub stderr: Option<ProcessOutput>,
    /// Resolves once the process has exited, or fails if it could not be waited on.
    pub exit: BoxFuture<'static, std::io::Result<ProcessExit>>,
    pub control: Arc<dyn ProcessControl>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

/// Starts processes.
pub trait ProcessSpawner: Send + Sync {
    /// Spawn `program` with `args`, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    fn spawn(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<ProcessHandle, SpawnError>;
}

/// Spawns real OS processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<ProcessHandle, SpawnError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| SpawnError::from_io(program, e))?;
        let pid = child.id();
        let stdout = child.stdout.take().map(|s| Box::new(s) as ProcessOutput);
        let stderr = child.stderr.take().map(|s| Box::new(s) as ProcessOutput);

        tracing::debug!(program, ?pid, "Spawned process");

        #[cfg(unix)]
        let (exit, control) = {
            let exit = async move { child.wait().await.map(ProcessExit::from) }.boxed();
            (exit, ChildControl { pid })
        };

        #[cfg(not(unix))]
        let (exit, control) = {
            let (kill_tx, mut kill_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
            let exit = async move {
                tokio::select! {
                    status = child.wait() => status.map(ProcessExit::from),
                    Some(()) = kill_rx.recv() => {
                        child.kill().await?;
                        child.wait().await.map(ProcessExit::from)
                    }
                }
            }
            .boxed();
            (exit, ChildControl { pid, kill_tx })
        };

        Ok(ProcessHandle {
            pid,
            stdout,
            stderr,
            exit,
            control: Arc::new(control),
        })
    }
}

#[derive(Debug)]
struct ChildControl {
    pid: Option<u32>,
    #[cfg(not(unix))]
    kill_tx: tokio::sync::mpsc::UnboundedSender<()>,
}

#[cfg(unix)]
impl ProcessControl for ChildControl {
    fn signal(&self, signal: ProcessSignal) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self.pid.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "process has no pid")
        })?;
        let pid = i32::try_from(pid)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let signal = match signal {
            ProcessSignal::Interrupt => Signal::SIGINT,
            ProcessSignal::Kill => Signal::SIGKILL,
        };
        kill(Pid::from_raw(pid), signal).map_err(std::io::Error::from)
    }
}

#[cfg(not(unix))]
impl ProcessControl for ChildControl {
    fn signal(&self, signal: ProcessSignal) -> std::io::Result<()> {
        tracing::debug!(pid = ?self.pid, %signal, "No signals on this platform, killing");
        self.kill_tx.send(()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "process already exited")
        })
    }
}
