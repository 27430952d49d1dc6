//! Locating and reading the configuration file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::AppConfig;

const LOCAL_FILE: &str = "tailrun.toml";

/// Finds the configuration file and turns it into an [`AppConfig`].
///
/// Without an explicit path, `./tailrun.toml` wins over
/// `<config dir>/tailrun/config.toml`, and a missing file means defaults. An
/// explicit path must exist.
#[derive(Debug)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
    explicit: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let candidates = std::iter::once(PathBuf::from(LOCAL_FILE))
            .chain(dirs::config_dir().map(|dir| dir.join("tailrun").join("config.toml")))
            .collect();
        Self {
            candidates,
            explicit: false,
        }
    }

    /// Load exactly `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
            explicit: true,
        }
    }

    /// Read and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if an explicit file is missing or
    /// any file cannot be read, [`ConfigError::ParseError`] for malformed
    /// TOML and [`ConfigError::Invalid`] for inconsistent settings.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let path = match self.find_config_file() {
            Some(path) => path,
            None if self.explicit => self.candidates[0].clone(),
            None => {
                tracing::debug!("No config file found, using defaults");
                return Ok(AppConfig::default());
            }
        };

        tracing::debug!(path = %path.display(), "Loading config file");
        let config = Self::read(&path)?;
        validate(&config).map_err(|reason| ConfigError::Invalid {
            path: path.clone(),
            reason,
        })?;
        tracing::info!(
            path = %path.display(),
            commands = config.commands.len(),
            allowed_logs = config.allowed_logs.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn read(path: &Path) -> Result<AppConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate files in order of priority.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// The first candidate that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &AppConfig) -> Result<(), String> {
    let mut ids = HashSet::new();
    for command in &config.commands {
        if command.id.is_empty() {
            return Err("command with empty id".to_string());
        }
        if !ids.insert(command.id.as_str()) {
            return Err(format!("duplicate command id {}", command.id));
        }
    }
    if let Some(path) = config.allowed_logs.iter().find(|p| !p.is_absolute()) {
        return Err(format!("allowed log {} is not absolute", path.display()));
    }
    if config.tail.poll_interval_ms == 0 {
        return Err("tail.poll_interval_ms must be positive".to_string());
    }
    Ok(())
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(LOCAL_FILE);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_local_file_is_searched_first() {
        let loader = ConfigLoader::new();
        assert!(loader.search_paths()[0].ends_with(LOCAL_FILE));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/tailrun.toml"));
        assert!(matches!(loader.load(), Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_reads_commands() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
                [[commands]]
                id = "hello"
                command = "echo"
                args = ["hi"]
            "#,
        );

        let config = ConfigLoader::with_path(path).load().unwrap();
        assert_eq!(config.commands[0].id, "hello");
        assert_eq!(config.commands[0].args, vec!["hi"]);
        assert_eq!(config.server.port, 3080);
    }

    #[test]
    fn test_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[server\nport = ");
        let result = ConfigLoader::with_path(path).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_rejects_duplicate_command_ids() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
                [[commands]]
                id = "a"
                command = "true"

                [[commands]]
                id = "a"
                command = "false"
            "#,
        );
        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(err.to_string().contains("duplicate command id a"));
    }

    #[test]
    fn test_rejects_relative_log_paths() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"allowed_logs = ["logs/app.log"]"#);
        let result = ConfigLoader::with_path(path).load();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
