//! Command definitions that executions are started from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::collection::Keyed;

/// A runnable command, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Stable identifier used by clients.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Program to run.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Line delimiter for this command's output. Falls back to the global one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eol: Option<String>,
}

impl CommandDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            eol: None,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn eol(mut self, eol: impl Into<String>) -> Self {
        self.eol = Some(eol.into());
        self
    }

    /// The command line, shell-quoted for display.
    #[must_use]
    pub fn display_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| shell_escape::escape(part.into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Keyed for CommandDefinition {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line_quotes_arguments() {
        let command = CommandDefinition::new("greet", "echo").args(["hello world", "plain"]);
        assert_eq!(command.display_line(), "echo 'hello world' plain");
    }

    #[test]
    fn test_deserialize_from_toml() {
        let command: CommandDefinition = toml::from_str(
            r#"
            id = "build"
            command = "make"
            args = ["-j4"]
            working_dir = "/srv/app"
            "#,
        )
        .unwrap();
        assert_eq!(command.id, "build");
        assert_eq!(command.name, "");
        assert_eq!(command.args, vec!["-j4"]);
        assert_eq!(command.working_dir, Some(PathBuf::from("/srv/app")));
        assert!(command.eol.is_none());
    }
}
