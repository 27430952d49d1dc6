//! Execution identity and change events.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::ExecutionStatus;
use crate::bus::{AttrValue, Attributed, Filter};

/// Identity of one execution: the command it ran and when it started.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionKey {
    pub command_id: String,
    pub start_time: i64,
}

impl ExecutionKey {
    #[must_use]
    pub fn new(command_id: impl Into<String>, start_time: i64) -> Self {
        Self {
            command_id: command_id.into(),
            start_time,
        }
    }

    /// Filter matching every event of this execution.
    #[must_use]
    pub fn filter(&self) -> Filter {
        Filter::any()
            .with("commandId", self.command_id.as_str())
            .with("startTime", self.start_time)
    }

    /// Filter matching only this execution's status changes.
    #[must_use]
    pub fn status_filter(&self) -> Filter {
        self.filter().with("type", "status")
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.command_id, self.start_time)
    }
}

/// A change pushed to clients watching an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutionEvent {
    #[serde(rename_all = "camelCase")]
    Status {
        command_id: String,
        start_time: i64,
        new_status: ExecutionStatus,
    },
    #[serde(rename_all = "camelCase")]
    Output {
        command_id: String,
        start_time: i64,
        changes: Vec<String>,
    },
}

impl ExecutionEvent {
    #[must_use]
    pub fn status(key: &ExecutionKey, new_status: ExecutionStatus) -> Self {
        Self::Status {
            command_id: key.command_id.clone(),
            start_time: key.start_time,
            new_status,
        }
    }

    #[must_use]
    pub fn output(key: &ExecutionKey, changes: Vec<String>) -> Self {
        Self::Output {
            command_id: key.command_id.clone(),
            start_time: key.start_time,
            changes,
        }
    }

    /// The `type` tag as it appears on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Output { .. } => "output",
        }
    }

    #[must_use]
    pub fn key(&self) -> ExecutionKey {
        match self {
            Self::Status {
                command_id,
                start_time,
                ..
            }
            | Self::Output {
                command_id,
                start_time,
                ..
            } => ExecutionKey::new(command_id.clone(), *start_time),
        }
    }
}

impl Attributed for ExecutionEvent {
    fn attribute(&self, name: &str) -> Option<AttrValue> {
        match (name, self) {
            ("type", _) => Some(self.kind().into()),
            (
                "commandId",
                Self::Status { command_id, .. } | Self::Output { command_id, .. },
            ) => Some(command_id.as_str().into()),
            (
                "startTime",
                Self::Status { start_time, .. } | Self::Output { start_time, .. },
            ) => Some((*start_time).into()),
            ("newStatus", Self::Status { new_status, .. }) => Some(new_status.as_str().into()),
            _ => None,
        }
    }
}
