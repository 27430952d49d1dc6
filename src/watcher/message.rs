//! Messages pushed to log-watching clients.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A message sent to a client watching log files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogMessage {
    /// New lines. `file` is set when one connection watches several files.
    Change {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        changes: Vec<String>,
    },
    Error {
        message: String,
    },
}

/// Builds the messages a watcher sends.
pub trait MessageFactory: Send + Sync {
    /// A change message for lines of the file at `path`.
    fn change(&self, path: &Path, changes: Vec<String>) -> LogMessage;

    /// An error message.
    fn error(&self, message: String) -> LogMessage {
        LogMessage::Error { message }
    }
}

/// `{"type":"change","changes":[...]}`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMessages;

impl MessageFactory for PlainMessages {
    fn change(&self, _path: &Path, changes: Vec<String>) -> LogMessage {
        LogMessage::Change {
            file: None,
            changes,
        }
    }
}

/// `{"type":"change","file":"...","changes":[...]}`
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTaggedMessages;

impl MessageFactory for FileTaggedMessages {
    fn change(&self, path: &Path, changes: Vec<String>) -> LogMessage {
        LogMessage::Change {
            file: Some(path.display().to_string()),
            changes,
        }
    }
}

/// Which [`MessageFactory`] to use, as configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    #[default]
    Plain,
    FileTagged,
}

impl MessageFormat {
    #[must_use]
    pub fn factory(self) -> Arc<dyn MessageFactory> {
        match self {
            Self::Plain => Arc::new(PlainMessages),
            Self::FileTagged => Arc::new(FileTaggedMessages),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_change_has_no_file() {
        let message = PlainMessages.change(Path::new("/a.log"), vec!["x".into()]);
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"change","changes":["x"]}"#
        );
    }

    #[test]
    fn test_tagged_change_names_the_file() {
        let message = FileTaggedMessages.change(Path::new("/a.log"), vec!["x".into()]);
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"change","file":"/a.log","changes":["x"]}"#
        );
    }

    #[test]
    fn test_error_message() {
        let message = MessageFormat::FileTagged.factory().error("boom".into());
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"error","message":"boom"}"#
        );
    }

    #[test]
    fn test_format_from_config_value() {
        #[derive(Deserialize)]
        struct Holder {
            format: MessageFormat,
        }
        let holder: Holder = toml::from_str(r#"format = "file_tagged""#).unwrap();
        assert_eq!(holder.format, MessageFormat::FileTagged);
    }
}
