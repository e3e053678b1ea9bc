//! Core runtime configuration.
//!
//! Parsed from JSON; every field is optional and falls back to
//! `CoreConfig::default()`.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, normalize_level};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
pub const MAX_NOTIFICATION_LIMIT: usize = 100;

/// How app-facing reads report a category the user cannot read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Denied reads look exactly like missing rows.
    #[default]
    Conceal,
    /// Denied reads surface as `Forbidden`.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file; `None` means in-memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Default page size for notification lists.
    pub notification_limit: usize,
    pub denial_policy: DenialPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
            denial_policy: DenialPolicy::Conceal,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_NOTIFICATION_LIMIT).contains(&self.notification_limit) {
            return Err(ConfigError::NotificationLimitOutOfRange(
                self.notification_limit,
            ));
        }
        if normalize_level(&self.log_level).is_err() {
            return Err(ConfigError::UnsupportedLogLevel(self.log_level.clone()));
        }
        Ok(())
    }

    /// Opens `db_path`, or a fresh in-memory database when it is unset.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }
}

/// Clamps a caller-supplied page size to `1..=MAX_NOTIFICATION_LIMIT`.
pub fn clamp_notification_limit(requested: Option<usize>, fallback: usize) -> usize {
    requested
        .unwrap_or(fallback)
        .clamp(1, MAX_NOTIFICATION_LIMIT)
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    NotificationLimitOutOfRange(usize),
    UnsupportedLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::NotificationLimitOutOfRange(value) => write!(
                f,
                "notification_limit must be within 1..={MAX_NOTIFICATION_LIMIT}, got {value}"
            ),
            Self::UnsupportedLogLevel(value) => write!(f, "unsupported log_level `{value}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
