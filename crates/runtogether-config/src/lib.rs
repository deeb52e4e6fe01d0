//! # runtogether configuration
//!
//! YAML configuration for a runtogether group plus the shell-style
//! tokenizer that turns command strings into argument vectors.
//!
//! ```yaml
//! version: "1.0"
//! commands:
//!   - "python -m http.server 8000"
//!   - "npm run watch"
//! grace_period: 3.0
//! poll_interval: 0.2
//! exit_on: any
//! ```

#![warn(missing_docs)]

use runtogether_process::Command;
use runtogether_supervisor::{ExitPolicy, SupervisorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod tokenize;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A command string could not be split into words
    #[error("Cannot parse command `{input}`: {reason}")]
    Tokenize {
        /// The offending command string
        input: String,
        /// What went wrong
        reason: String,
    },
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Commands to run together, in launch order
    #[serde(default)]
    pub commands: Vec<String>,

    /// Seconds between the graceful and the forced termination request
    #[serde(default = "default_grace_period")]
    pub grace_period: f64,

    /// Seconds between two liveness scans
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Which child exits bring the group down
    #[serde(default)]
    pub exit_on: ExitPolicy,

    /// Working directory for every command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment for every command
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Command run once shutdown has completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_shutdown: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            commands: Vec::new(),
            grace_period: default_grace_period(),
            poll_interval: default_poll_interval(),
            exit_on: ExitPolicy::default(),
            working_dir: None,
            env: BTreeMap::new(),
            on_shutdown: None,
        }
    }
}

impl Config {
    /// Supervisor settings described by this configuration
    pub fn supervisor_config(&self) -> Result<SupervisorConfig> {
        Ok(SupervisorConfig::default()
            .with_grace_period(seconds("grace_period", self.grace_period)?)
            .with_poll_interval(seconds("poll_interval", self.poll_interval)?)
            .with_exit_policy(self.exit_on))
    }

    /// Tokenize every command string, applying the shared working
    /// directory and environment.
    pub fn build_commands(&self) -> Result<Vec<Command>> {
        self.commands
            .iter()
            .map(|line| self.build_command(line))
            .collect()
    }

    /// Tokenize one command string with the shared settings applied
    pub fn build_command(&self, line: &str) -> Result<Command> {
        let argv = tokenize::split_non_empty(line)?;
        let mut command = Command::from_argv(&argv).map_err(|e| ConfigError::Tokenize {
            input: line.to_string(),
            reason: e.to_string(),
        })?;
        command.label(line).envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        Ok(command)
    }
}

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            config.version
        )));
    }

    seconds("grace_period", config.grace_period)?;
    seconds("poll_interval", config.poll_interval)?;

    for line in &config.commands {
        tokenize::split_non_empty(line)?;
    }

    if let Some(hook) = &config.on_shutdown {
        tokenize::split_non_empty(hook)?;
    }

    Ok(())
}

/// Convert a positive number of seconds into a `Duration`
fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "{} must be a positive number of seconds, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| {
        ConfigError::ValidationError(format!("{} of {} seconds is out of range: {}", name, value, e))
    })
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_grace_period() -> f64 {
    3.0
}

fn default_poll_interval() -> f64 {
    0.2
}
