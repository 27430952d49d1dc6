//! HTTP API: JSON endpoints for commands, executions and logs, with live
//! updates streamed as server-sent events.

mod api;
mod error;
mod handlers;
#[allow(clippy::module_inception)]
mod server;

pub use api::{
    ActionResponse, CommandSummary, ErrorResponse, ExecutionSummary, LogEventsQuery, LogQuery,
    SizeResponse,
};
pub use error::{ApiError, ServerError};
pub use handlers::{AppState, EventStream};
pub use server::ApiServer;
