//! Run Configuration
//!
//! Controls deadlines, retries and the environment label of a run.
//! Config is stored in `~/.config/dagflow/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Explicit setters (CLI flags)
//! 2. Environment variables (`DAGFLOW_TIMEOUT_MS`, `DAGFLOW_NODE_TIMEOUT_MS`,
//!    `DAGFLOW_MAX_RETRIES`, `DAGFLOW_ENV`)
//! 3. Config file (`~/.config/dagflow/config.toml`)
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DagflowError, Result};
use crate::resilience::RetryConfig;

pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Options of one run
///
/// ```toml
/// timeout_ms = 30000
/// node_timeout_ms = 5000
/// environment = "staging"
///
/// [retry]
/// max_retries = 2
/// initial_delay_ms = 50
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Deadline for the whole run, nested runs included
    pub timeout_ms: Option<u64>,
    /// Deadline for one attempt of one node
    pub node_timeout_ms: Option<u64>,
    /// Free-form label reported with the run
    pub environment: String,
    pub retry: RetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            node_timeout_ms: None,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    /// `~/.config/dagflow/` on Unix, `%APPDATA%/dagflow/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dagflow")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the user config file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| DagflowError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DagflowError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| DagflowError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| DagflowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| DagflowError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })?;

        Ok(())
    }

    /// Merge with environment variables
    ///
    /// Empty variables are ignored; unparsable numbers are an error.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(ms) = env_number("DAGFLOW_TIMEOUT_MS")? {
            self.timeout_ms = Some(ms);
        }
        if let Some(ms) = env_number("DAGFLOW_NODE_TIMEOUT_MS")? {
            self.node_timeout_ms = Some(ms);
        }
        if let Some(n) = env_number("DAGFLOW_MAX_RETRIES")? {
            self.retry.max_retries = u32::try_from(n).map_err(|_| DagflowError::ConfigError {
                reason: format!("DAGFLOW_MAX_RETRIES out of range: {n}"),
            })?;
        }
        if let Ok(env) = std::env::var("DAGFLOW_ENV") {
            if !env.is_empty() {
                self.environment = env;
            }
        }
        Ok(self)
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn with_node_timeout_ms(mut self, ms: u64) -> Self {
        self.node_timeout_ms = Some(ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment = env.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|_| DagflowError::ConfigError {
                    reason: format!("{key} must be a non-negative integer, got '{raw}'"),
                })
        }
        _ => Ok(None),
    }
}
