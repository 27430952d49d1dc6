//! Command executions: process spawning, the execution state machine, and the
//! service that tracks active and completed runs.

mod command;
mod error;
mod event;
#[allow(clippy::module_inception)]
mod execution;
mod process;
mod service;
mod state;
mod watch;

pub use command::CommandDefinition;
pub use error::{ExecutionError, ServiceError};
pub use event::{ExecutionEvent, ExecutionKey};
pub use execution::{Execution, ExecutionSnapshot, ListenerId, OutputStream};
pub use process::{
    ProcessControl, ProcessExit, ProcessHandle, ProcessOutput, ProcessSignal, ProcessSpawner,
    SpawnError, TokioSpawner,
};
pub use service::ExecutionService;
pub use state::ExecutionStatus;
pub use watch::ExecutionWatch;
