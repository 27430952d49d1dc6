//! The execution state machine.
//!
//! An [`Execution`] wraps one run of a command. While running it owns the
//! process's control handle and two line buffers (stdout, stderr); output
//! lines and status changes are raised to registered listeners. Once the
//! status is terminal the execution is finalized exactly once, which drops
//! the process handle and every listener and leaves an immutable record.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::ExecutionError;
use super::event::ExecutionKey;
use super::process::{ProcessControl, ProcessExit, ProcessHandle, ProcessOutput, ProcessSignal};
use super::state::ExecutionStatus;
use crate::bus::call_isolated;
use crate::collection::Keyed;
use crate::lines::{LineBuffer, Utf8Decoder};

/// Size of each raw read from a process pipe.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Line appended when an execution is discarded before the OS reports exit.
const HALTED_ABRUPTLY: &str = "Process was halted abruptly";

/// Which pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Identifies a registered output or status listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type OutputListener = Arc<dyn Fn(&[String]) + Send + Sync>;
type StatusListener = Arc<dyn Fn(ExecutionStatus) + Send + Sync>;

struct Inner {
    status: ExecutionStatus,
    output: Vec<String>,
    stdout: LineBuffer,
    stderr: LineBuffer,
    control: Option<Arc<dyn ProcessControl>>,
    attached: bool,
    finalized: bool,
    next_listener: u64,
    output_listeners: Vec<(ListenerId, OutputListener)>,
    status_listeners: Vec<(ListenerId, StatusListener)>,
}

/// One run of a command.
pub struct Execution {
    key: ExecutionKey,
    eol: String,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<ExecutionStatus>,
}

/// Plain serializable view of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub command_id: String,
    pub start_time: i64,
    pub status: ExecutionStatus,
    pub output: Vec<String>,
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Execution")
            .field("key", &self.key)
            .field("status", &inner.status)
            .field("lines", &inner.output.len())
            .field("finalized", &inner.finalized)
            .finish_non_exhaustive()
    }
}

impl Execution {
    fn with_state(
        key: ExecutionKey,
        eol: String,
        status: ExecutionStatus,
        output: Vec<String>,
    ) -> Self {
        let stdout = LineBuffer::new(eol.clone());
        let eol = stdout.eol().to_string();
        let (status_tx, _) = watch::channel(status);
        Self {
            key,
            inner: Mutex::new(Inner {
                status,
                output,
                stderr: LineBuffer::new(eol.clone()),
                stdout,
                control: None,
                attached: false,
                finalized: false,
                next_listener: 0,
                output_listeners: Vec::new(),
                status_listeners: Vec::new(),
            }),
            eol,
            status_tx,
        }
    }

    /// Create a running execution that has no process attached yet.
    ///
    /// Listeners registered before [`attach`](Self::attach) see every line.
    #[must_use]
    pub fn running(command_id: impl Into<String>, start_time: i64, eol: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::with_state(
            ExecutionKey::new(command_id, start_time),
            eol.into(),
            ExecutionStatus::Running,
            Vec::new(),
        ))
    }

    /// Create a running execution and attach `process` to it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        command_id: impl Into<String>,
        start_time: i64,
        process: ProcessHandle,
        eol: impl Into<String>,
    ) -> Arc<Self> {
        let execution = Self::running(command_id, start_time, eol);
        // A fresh execution is running and unattached, so this cannot fail.
        if let Err(e) = execution.attach(process) {
            tracing::error!(error = %e, "Failed to attach process to new execution");
        }
        execution
    }

    /// Rebuild a finished execution from stored output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::NotTerminal`] if `status` is `Running`: a
    /// stored record has no process to follow.
    pub fn reconstruct(
        command_id: impl Into<String>,
        start_time: i64,
        output: Vec<String>,
        status: ExecutionStatus,
        eol: impl Into<String>,
    ) -> Result<Arc<Self>, ExecutionError> {
        let key = ExecutionKey::new(command_id, start_time);
        if !status.is_terminal() {
            return Err(ExecutionError::NotTerminal(key));
        }
        let execution = Self::with_state(key, eol.into(), status, output);
        execution.lock().finalized = true;
        Ok(Arc::new(execution))
    }

    /// Start following `process`: its pipes feed the line buffers and its
    /// exit drives the terminal transition.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyAttached`] if a process was attached
    /// before, or [`ExecutionError::AttachInWrongState`] if the execution is
    /// no longer running.
    pub fn attach(self: &Arc<Self>, process: ProcessHandle) -> Result<(), ExecutionError> {
        let ProcessHandle {
            pid,
            stdout,
            stderr,
            exit,
            control,
        } = process;

        {
            let mut inner = self.lock();
            if inner.attached {
                return Err(ExecutionError::AlreadyAttached(self.key.clone()));
            }
            if inner.status.is_terminal() || inner.finalized {
                return Err(ExecutionError::AttachInWrongState {
                    key: self.key.clone(),
                    status: inner.status,
                });
            }
            inner.attached = true;
            inner.control = Some(control);
        }

        tracing::info!(execution = %self.key, ?pid, "Execution started");

        let readers: Vec<JoinHandle<()>> = [
            stdout.map(|r| (r, OutputStream::Stdout)),
            stderr.map(|r| (r, OutputStream::Stderr)),
        ]
        .into_iter()
        .flatten()
        .map(|(reader, stream)| tokio::spawn(pump_output(Arc::clone(self), reader, stream)))
        .collect();

        let execution = Arc::clone(self);
        tokio::spawn(async move {
            // The process counts as closed once both pipes are drained and it exited.
            for reader in readers {
                if let Err(e) = reader.await {
                    tracing::warn!(execution = %execution.key, error = %e, "Output reader failed");
                }
            }
            match exit.await {
                Ok(exit) => execution.on_close(&exit),
                Err(e) => execution.on_error(&e.to_string()),
            }
        });

        Ok(())
    }

    #[must_use]
    pub fn key(&self) -> &ExecutionKey {
        &self.key
    }

    #[must_use]
    pub fn command_id(&self) -> &str {
        &self.key.command_id
    }

    #[must_use]
    pub fn start_time(&self) -> i64 {
        self.key.start_time
    }

    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.lock().status
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.lock().finalized
    }

    /// Output collected so far, one entry per line.
    #[must_use]
    pub fn output_lines(&self) -> Vec<String> {
        self.lock().output.clone()
    }

    /// Output collected so far, joined with the execution's delimiter.
    #[must_use]
    pub fn output_text(&self) -> String {
        self.lock().output.join(&self.eol)
    }

    #[must_use]
    pub fn snapshot(&self) -> ExecutionSnapshot {
        let inner = self.lock();
        ExecutionSnapshot {
            command_id: self.key.command_id.clone(),
            start_time: self.key.start_time,
            status: inner.status,
            output: inner.output.clone(),
        }
    }

    /// Listing order: newer executions first; equal start times are equal.
    #[must_use]
    pub fn cmp_recency(&self, other: &Self) -> Ordering {
        other.key.start_time.cmp(&self.key.start_time)
    }

    /// Wait until the execution reaches a terminal status.
    pub async fn wait_terminal(&self) -> ExecutionStatus {
        let mut rx = self.status_tx.subscribe();
        let status = match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    /// Register a listener for newly completed output lines.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyFinalized`] once the execution has
    /// been finalized.
    pub fn add_output_listener<F>(&self, listener: F) -> Result<ListenerId, ExecutionError>
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = self.next_listener_id(&mut inner)?;
        inner.output_listeners.push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Register a listener for the terminal status change.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyFinalized`] once the execution has
    /// been finalized.
    pub fn add_status_listener<F>(&self, listener: F) -> Result<ListenerId, ExecutionError>
    where
        F: Fn(ExecutionStatus) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = self.next_listener_id(&mut inner)?;
        inner.status_listeners.push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.output_listeners.len() + inner.status_listeners.len();
        inner.output_listeners.retain(|(lid, _)| *lid != id);
        inner.status_listeners.retain(|(lid, _)| *lid != id);
        before != inner.output_listeners.len() + inner.status_listeners.len()
    }

    fn next_listener_id(&self, inner: &mut Inner) -> Result<ListenerId, ExecutionError> {
        if inner.finalized {
            return Err(ExecutionError::AlreadyFinalized(self.key.clone()));
        }
        inner.next_listener += 1;
        Ok(ListenerId(inner.next_listener))
    }

    /// Ask the process to stop (SIGINT).
    ///
    /// The status changes only once the process actually exits.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::TerminationInWrongState`] if the execution
    /// already reached a terminal status.
    pub fn terminate(&self) -> Result<(), ExecutionError> {
        self.send_signal(ProcessSignal::Interrupt)
    }

    /// Kill the process (SIGKILL).
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::TerminationInWrongState`] if the execution
    /// already reached a terminal status.
    pub fn halt(&self) -> Result<(), ExecutionError> {
        self.send_signal(ProcessSignal::Kill)
    }

    /// Kill the process and finalize without waiting for the OS to confirm.
    ///
    /// The execution is marked failed immediately; the eventual exit report
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::TerminationInWrongState`] if the execution
    /// already reached a terminal status.
    pub fn halt_abruptly(&self) -> Result<(), ExecutionError> {
        self.halt()?;
        self.fail(HALTED_ABRUPTLY);
        self.finalize()
    }

    fn send_signal(&self, signal: ProcessSignal) -> Result<(), ExecutionError> {
        let control = {
            let inner = self.lock();
            if inner.status.is_terminal() {
                return Err(ExecutionError::TerminationInWrongState {
                    key: self.key.clone(),
                    status: inner.status,
                });
            }
            inner
                .control
                .clone()
                .ok_or_else(|| ExecutionError::NotAttached(self.key.clone()))?
        };

        tracing::info!(execution = %self.key, %signal, "Signalling process");
        control
            .signal(signal)
            .map_err(|source| ExecutionError::Signal {
                key: self.key.clone(),
                signal,
                source,
            })
    }

    /// Detach from the process and drop every listener.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::FinalizationInWrongState`] while the
    /// execution is running, and [`ExecutionError::AlreadyFinalized`] on a
    /// second call.
    pub fn finalize(&self) -> Result<(), ExecutionError> {
        let mut inner = self.lock();
        if !inner.status.is_terminal() {
            return Err(ExecutionError::FinalizationInWrongState {
                key: self.key.clone(),
                status: inner.status,
            });
        }
        if inner.finalized {
            return Err(ExecutionError::AlreadyFinalized(self.key.clone()));
        }

        inner.stdout.clear();
        inner.stderr.clear();
        inner.control = None;
        inner.output_listeners.clear();
        inner.status_listeners.clear();
        inner.finalized = true;

        tracing::debug!(execution = %self.key, status = %inner.status, "Execution finalized");
        Ok(())
    }

    fn on_chunk(&self, stream: OutputStream, text: &str) {
        let (lines, listeners) = {
            let mut inner = self.lock();
            if inner.status.is_terminal() {
                tracing::trace!(execution = %self.key, "Ignoring output after exit");
                return;
            }
            let buffer = match stream {
                OutputStream::Stdout => &mut inner.stdout,
                OutputStream::Stderr => &mut inner.stderr,
            };
            let lines = buffer.read_lines(text);
            if lines.is_empty() {
                return;
            }
            inner.output.extend(lines.iter().cloned());
            (lines, inner.output_listeners.clone())
        };

        self.emit_output(&lines, &listeners);
    }

    fn on_close(&self, exit: &ProcessExit) {
        let (lines, status, output_listeners, status_listeners) = {
            let mut inner = self.lock();
            if inner.status.is_terminal() {
                tracing::debug!(execution = %self.key, "Ignoring exit report for finished execution");
                return;
            }

            let mut lines: Vec<String> = [inner.stdout.flush(), inner.stderr.flush()]
                .into_iter()
                .flatten()
                .collect();
            lines.push(exit.diagnostic());
            inner.output.extend(lines.iter().cloned());

            let status = exit.status();
            debug_assert!(inner.status.can_transition_to(status));
            inner.status = status;
            inner.control = None;
            (
                lines,
                status,
                inner.output_listeners.clone(),
                inner.status_listeners.clone(),
            )
        };

        tracing::info!(
            execution = %self.key,
            code = ?exit.code,
            signal = ?exit.signal,
            %status,
            "Process closed"
        );

        self.emit_output(&lines, &output_listeners);
        self.emit_status(status, &status_listeners);
    }

    fn on_error(&self, message: &str) {
        tracing::warn!(execution = %self.key, error = message, "Process error");
        self.fail(message);
    }

    fn fail(&self, message: &str) {
        let (output_listeners, status_listeners) = {
            let mut inner = self.lock();
            if inner.status.is_terminal() {
                return;
            }
            inner.output.push(message.to_string());
            inner.status = ExecutionStatus::Failed;
            inner.control = None;
            (
                inner.output_listeners.clone(),
                inner.status_listeners.clone(),
            )
        };

        self.emit_output(&[message.to_string()], &output_listeners);
        self.emit_status(ExecutionStatus::Failed, &status_listeners);
    }

    /// One event per line, each delivered to every listener before the next.
    fn emit_output(&self, lines: &[String], listeners: &[(ListenerId, OutputListener)]) {
        for line in lines {
            for (id, listener) in listeners {
                if self.is_finalized() {
                    return;
                }
                call_isolated(format_args!("{} output {}", self.key, id.0), || {
                    listener(std::slice::from_ref(line));
                });
            }
        }
    }

    fn emit_status(&self, status: ExecutionStatus, listeners: &[(ListenerId, StatusListener)]) {
        for (id, listener) in listeners {
            if self.is_finalized() {
                break;
            }
            call_isolated(format_args!("{} status {}", self.key, id.0), || listener(status));
        }
        self.status_tx.send_replace(status);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Keyed for Arc<Execution> {
    type Key = ExecutionKey;

    fn key(&self) -> ExecutionKey {
        Execution::key(self).clone()
    }
}

async fn pump_output(execution: Arc<Execution>, mut reader: ProcessOutput, stream: OutputStream) {
    let mut decoder = Utf8Decoder::new();
    let mut buf = vec![0_u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    execution.on_chunk(stream, &text);
                }
            }
            Err(e) => {
                tracing::warn!(execution = %execution.key, ?stream, error = %e, "Failed to read process output");
                break;
            }
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        execution.on_chunk(stream, &rest);
    }
}
