//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::CommandDefinition;
use crate::lines::DEFAULT_EOL;
use crate::resource::{TailBackend, TailOptions};
use crate::watcher::MessageFormat;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub tail: TailSettings,
    /// Commands clients may run.
    pub commands: Vec<CommandDefinition>,
    /// Absolute paths of the log files clients may tail.
    pub allowed_logs: Vec<PathBuf>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow requests from any origin.
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: false,
        }
    }
}

/// Log tailing and line splitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailSettings {
    #[serde(default)]
    pub backend: TailBackend,
    /// Line delimiter for log files and for commands without their own.
    #[serde(default = "default_eol")]
    pub eol: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_tail_binary")]
    pub tail_binary: String,
    #[serde(default)]
    pub message_format: MessageFormat,
}

fn default_eol() -> String {
    DEFAULT_EOL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_tail_binary() -> String {
    "tail".to_string()
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            backend: TailBackend::default(),
            eol: default_eol(),
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            tail_binary: default_tail_binary(),
            message_format: MessageFormat::default(),
        }
    }
}

impl TailSettings {
    /// Options for following files with these settings.
    #[must_use]
    pub fn options(&self) -> TailOptions {
        TailOptions {
            backend: self.backend,
            eol: self.eol.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            debounce: Duration::from_millis(self.debounce_ms),
            tail_binary: self.tail_binary.clone(),
        }
    }
}
