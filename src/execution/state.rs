//! Execution status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution.
///
/// `Running` is the only non-terminal state; it moves to exactly one of the
/// terminal states and never leaves it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Running && next.is_terminal()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_moves_to_terminal() {
        use ExecutionStatus::{Failed, Running, Succeeded};

        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Running));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
        let parsed: ExecutionStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, ExecutionStatus::Failed);
    }
}
