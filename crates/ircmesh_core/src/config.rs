//! Core runtime settings.
//!
//! # Responsibility
//! - Describe the few settings the core itself consumes.
//! - Parse them from JSON and reject values the core cannot honour.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - `validate` runs before any setting is used.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_MAX_CULL_PASSES: u32 = 8;

/// Settings consumed by the core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Log level (`trace|debug|info|warn|error`).
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    pub log_dir: Option<String>,
    /// SQLite file holding persisted extension data; `None` keeps it in memory.
    pub snapshot_path: Option<String>,
    /// Upper bound on cull-list drains during shutdown.
    pub max_cull_passes: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            snapshot_path: None,
            max_cull_passes: DEFAULT_MAX_CULL_PASSES,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "warning" | "error" => {}
            other => return Err(ConfigError::UnsupportedLogLevel(other.to_string())),
        }
        if let Some(dir) = &self.log_dir {
            if !Path::new(dir.trim()).is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }
        if self.max_cull_passes == 0 {
            return Err(ConfigError::ZeroCullPasses);
        }
        Ok(())
    }
}

/// Config parse/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    UnsupportedLogLevel(String),
    RelativeLogDir(String),
    ZeroCullPasses,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "config is not valid JSON: {message}"),
            Self::UnsupportedLogLevel(level) => write!(f, "unsupported log level: {level}"),
            Self::RelativeLogDir(dir) => write!(f, "log_dir must be absolute, got `{dir}`"),
            Self::ZeroCullPasses => write!(f, "max_cull_passes must be at least 1"),
        }
    }
}

impl Error for ConfigError {}
