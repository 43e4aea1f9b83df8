//! Runtime configuration for storage and logging bootstrap.
//!
//! # Responsibility
//! - Describe where the store lives and how the connection is tuned.
//! - Resolve settings from `DATADESK_*` environment variables or JSON.
//!
//! # Invariants
//! - Every field has a usable default; blank environment values are ignored.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_DB_FILE_NAME: &str = "datadesk.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB_PATH: &str = "DATADESK_DB_PATH";
pub const ENV_JOURNAL_MODE: &str = "DATADESK_JOURNAL_MODE";
pub const ENV_BUSY_TIMEOUT_MS: &str = "DATADESK_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "DATADESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DATADESK_LOG_DIR";

/// SQLite journal mode applied to file-backed connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log; single writer, concurrent readers.
    #[default]
    Wal,
    /// Rollback journal deleted after each transaction.
    Delete,
    /// Journal kept in memory only.
    Memory,
}

impl JournalMode {
    /// Returns the `PRAGMA journal_mode` value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
            Self::Memory => "memory",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wal" => Some(Self::Wal),
            "delete" => Some(Self::Delete),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Configuration error raised while reading env or JSON input.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
            Self::Json(err) => write!(f, "invalid config json: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidValue { .. } => None,
            Self::Json(err) => Some(err),
        }
    }
}

/// Core configuration shared by the host boundary and the CLI probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Journal mode for file databases. Ignored for in-memory stores.
    pub journal_mode: JournalMode,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs. `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            journal_mode: JournalMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Builds configuration from `DATADESK_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// # Errors
    /// - Returns an error when journal mode or busy timeout cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parses configuration from a JSON object. Missing fields use defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(mode) = read(ENV_JOURNAL_MODE) {
            config.journal_mode =
                JournalMode::parse(&mode).ok_or(ConfigError::InvalidValue {
                    key: ENV_JOURNAL_MODE,
                    value: mode,
                })?;
        }
        if let Some(timeout) = read(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_BUSY_TIMEOUT_MS,
                value: timeout.clone(),
            })?;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, JournalMode, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH, ENV_JOURNAL_MODE};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn lookup_overrides_defaults_and_ignores_blanks() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/data/app.db"),
            (ENV_JOURNAL_MODE, "DELETE"),
            (ENV_BUSY_TIMEOUT_MS, "   "),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/data/app.db"));
        assert_eq!(config.journal_mode, JournalMode::Delete);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn lookup_rejects_unknown_journal_mode() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_JOURNAL_MODE, "truncate")])).unwrap_err();
        assert!(err.to_string().contains(ENV_JOURNAL_MODE));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = CoreConfig::from_json(r#"{"journal_mode":"memory","busy_timeout_ms":250}"#)
            .unwrap();
        assert_eq!(config.journal_mode, JournalMode::Memory);
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(config.log_dir.is_none());
    }
}
