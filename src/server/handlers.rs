//! HTTP handlers for the API.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use super::api::{
    ActionResponse, CommandSummary, ExecutionSummary, LogEventsQuery, LogQuery, SizeResponse,
};
use super::error::ApiError;
use crate::collection::InMemoryCollection;
use crate::config::AppConfig;
use crate::execution::{ExecutionKey, ExecutionService, ExecutionSnapshot};
use crate::logs::{AllowedLog, LogService};
use crate::outbound::{Outbound, Outgoing};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub executions: ExecutionService,
    pub logs: LogService,
}

impl AppState {
    #[must_use]
    pub fn new(executions: ExecutionService, logs: LogService) -> Self {
        Self { executions, logs }
    }

    /// Build both services from a configuration file.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let commands = InMemoryCollection::with_items(config.commands.iter().cloned());
        let executions =
            ExecutionService::new(Arc::new(commands)).with_default_eol(config.tail.eol.clone());

        let allowed =
            InMemoryCollection::with_items(config.allowed_logs.iter().cloned().map(AllowedLog::new));
        let logs = LogService::new(
            Arc::new(allowed),
            config.tail.options(),
            config.tail.message_format.factory(),
        );

        Self::new(executions, logs)
    }
}

type BoxEventStream = Pin<Box<dyn futures_core::Stream<Item = Result<Event, Infallible>> + Send>>;

/// An SSE response streaming one client's messages.
pub type EventStream = Sse<BoxEventStream>;

/// Turn a client's outgoing queue into an SSE stream.
///
/// `guard` lives as long as the stream: dropping the connection drops it,
/// which is how watches get released.
fn outgoing_sse<G>(rx: mpsc::UnboundedReceiver<Outgoing>, guard: G) -> EventStream
where
    G: Send + 'static,
{
    let stream = UnboundedReceiverStream::new(rx)
        .take_while(|item| matches!(item, Outgoing::Message(_)))
        .filter_map(move |item| {
            let _guard = &guard;
            match item {
                Outgoing::Message(text) => Some(Ok(Event::default().data(text))),
                Outgoing::Close => None,
            }
        });

    let stream: BoxEventStream = Box::pin(stream);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/commands - List runnable commands.
pub async fn list_commands(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommandSummary>>, ApiError> {
    let commands = state.executions.commands().await?;
    Ok(Json(commands.iter().map(CommandSummary::from).collect()))
}

/// POST /api/commands/:id/run - Start an execution of a command.
pub async fn run_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ExecutionSnapshot>), ApiError> {
    let execution = state.executions.start(&id).await?;
    Ok((StatusCode::CREATED, Json(execution.snapshot())))
}

/// GET /api/executions - Active and completed executions, newest first.
pub async fn list_executions(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExecutionSummary>>, ApiError> {
    let executions = state.executions.list().await?;
    Ok(Json(
        executions
            .iter()
            .map(|execution| ExecutionSummary::from(execution.as_ref()))
            .collect(),
    ))
}

/// GET /api/executions/:command_id/:start_time - One execution with its output.
pub async fn get_execution(
    State(state): State<AppState>,
    Path((command_id, start_time)): Path<(String, i64)>,
) -> Result<Json<ExecutionSnapshot>, ApiError> {
    let key = ExecutionKey::new(command_id, start_time);
    let execution = state.executions.get(&key).await?;
    Ok(Json(execution.snapshot()))
}

/// POST /api/executions/:command_id/:start_time/terminate - Send an interrupt.
pub async fn terminate_execution(
    State(state): State<AppState>,
    Path((command_id, start_time)): Path<(String, i64)>,
) -> Result<Json<ActionResponse>, ApiError> {
    let key = ExecutionKey::new(command_id, start_time);
    state.executions.terminate(&key).await?;
    Ok(Json(ActionResponse::success(format!("Terminating {key}"))))
}

/// POST /api/executions/:command_id/:start_time/halt - Kill the process.
pub async fn halt_execution(
    State(state): State<AppState>,
    Path((command_id, start_time)): Path<(String, i64)>,
) -> Result<Json<ActionResponse>, ApiError> {
    let key = ExecutionKey::new(command_id, start_time);
    state.executions.halt(&key).await?;
    Ok(Json(ActionResponse::success(format!("Halting {key}"))))
}

/// DELETE /api/executions/:command_id/:start_time - Forget an execution.
pub async fn discard_execution(
    State(state): State<AppState>,
    Path((command_id, start_time)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let key = ExecutionKey::new(command_id, start_time);
    state.executions.discard(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/executions/:command_id/:start_time/events - SSE stream of one execution.
pub async fn execution_events(
    State(state): State<AppState>,
    Path((command_id, start_time)): Path<(String, i64)>,
) -> Result<EventStream, ApiError> {
    let key = ExecutionKey::new(command_id, start_time);
    let (outbound, rx) = Outbound::channel();
    let watch = state.executions.watch(&key, outbound).await?;
    tracing::debug!(execution = %key, "Client watching execution");
    Ok(outgoing_sse(rx, watch))
}

/// GET /api/logs - Allow-listed log files.
pub async fn list_logs(State(state): State<AppState>) -> Result<Json<Vec<AllowedLog>>, ApiError> {
    Ok(Json(state.logs.allowed_logs().await?))
}

/// GET /api/logs/size?path= - Current size of a log file.
pub async fn log_size(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<SizeResponse>, ApiError> {
    let size = state.logs.size(&query.path).await?;
    Ok(Json(SizeResponse {
        path: query.path,
        size,
    }))
}

/// GET /api/logs/events?path=&from_beginning= - SSE stream of a log file.
pub async fn log_events(
    State(state): State<AppState>,
    Query(query): Query<LogEventsQuery>,
) -> Result<EventStream, ApiError> {
    let (outbound, rx) = Outbound::channel();
    let session = state.logs.open_session(outbound);
    session.watch(&query.path, query.from_beginning).await?;
    Ok(outgoing_sse(rx, session))
}
