//! Request and response types for the HTTP endpoints.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::execution::{CommandDefinition, Execution, ExecutionStatus};

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A runnable command as listed by GET /api/commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSummary {
    pub id: String,
    pub name: String,
    /// Shell-escaped command line.
    pub command_line: String,
}

impl From<&CommandDefinition> for CommandSummary {
    fn from(command: &CommandDefinition) -> Self {
        Self {
            id: command.id.clone(),
            name: if command.name.is_empty() {
                command.id.clone()
            } else {
                command.name.clone()
            },
            command_line: command.display_line(),
        }
    }
}

/// An execution without its output, as listed by GET /api/executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub command_id: String,
    pub start_time: i64,
    pub status: ExecutionStatus,
    pub line_count: usize,
}

impl From<&Execution> for ExecutionSummary {
    fn from(execution: &Execution) -> Self {
        Self {
            command_id: execution.command_id().to_string(),
            start_time: execution.start_time(),
            status: execution.status(),
            line_count: execution.output_lines().len(),
        }
    }
}

/// Response for POST /api/commands/:id/run and the execution actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Query naming one log file.
#[derive(Debug, Clone, Deserialize)]
pub struct LogQuery {
    pub path: PathBuf,
}

/// Query for GET /api/logs/events.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEventsQuery {
    pub path: PathBuf,
    /// Send the current content before any change.
    #[serde(default)]
    pub from_beginning: bool,
}

/// Response for GET /api/logs/size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeResponse {
    pub path: PathBuf,
    pub size: u64,
}
