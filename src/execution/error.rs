//! Execution error types.

use super::event::ExecutionKey;
use super::process::{ProcessSignal, SpawnError};
use super::state::ExecutionStatus;
use crate::collection::CollectionError;

/// Errors raised by an [`Execution`](super::Execution).
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    /// Terminate or halt was called on a finished execution.
    #[error("Cannot terminate execution {key}: status is {status}")]
    TerminationInWrongState {
        key: ExecutionKey,
        status: ExecutionStatus,
    },

    /// Finalize was called while the execution is still running.
    #[error("Cannot finalize execution {key}: status is {status}")]
    FinalizationInWrongState {
        key: ExecutionKey,
        status: ExecutionStatus,
    },

    /// A process was attached to an execution that is no longer running.
    #[error("Cannot attach a process to execution {key}: status is {status}")]
    AttachInWrongState {
        key: ExecutionKey,
        status: ExecutionStatus,
    },

    #[error("Execution {0} is already finalized")]
    AlreadyFinalized(ExecutionKey),

    #[error("Execution {0} already has a process attached")]
    AlreadyAttached(ExecutionKey),

    /// The execution has no process to signal.
    #[error("Execution {0} has no process attached")]
    NotAttached(ExecutionKey),

    /// A stored execution must carry a terminal status.
    #[error("Execution {0} cannot be rebuilt in running state")]
    NotTerminal(ExecutionKey),

    /// The OS refused to deliver a signal.
    #[error("Failed to send {signal} to execution {key}: {source}")]
    Signal {
        key: ExecutionKey,
        signal: ProcessSignal,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the [`ExecutionService`](super::ExecutionService).
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Execution not found: {0}")]
    NotFound(ExecutionKey),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}
