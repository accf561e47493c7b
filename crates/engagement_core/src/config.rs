//! Runtime configuration.
//!
//! # Responsibility
//! - Load `EngagementConfig` from TOML, apply `ENGAGEMENT_*` environment
//!   overrides, and validate the result.
//!
//! # Invariants
//! - Every section has defaults, so an empty file is a valid config.
//! - `validate` runs after overrides; an invalid override is rejected.

use crate::db::MAX_BUSY_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Database path that selects a private in-memory database.
pub const IN_MEMORY_DB_PATH: &str = ":memory:";

pub const ENV_DB_PATH: &str = "ENGAGEMENT_DB_PATH";
pub const ENV_DB_POOL_SIZE: &str = "ENGAGEMENT_DB_POOL_SIZE";
pub const ENV_OP_TIMEOUT_MS: &str = "ENGAGEMENT_OP_TIMEOUT_MS";
pub const ENV_EXCHANGE: &str = "ENGAGEMENT_EXCHANGE";
pub const ENV_EVENT_QUEUE_CAPACITY: &str = "ENGAGEMENT_EVENT_QUEUE_CAPACITY";
pub const ENV_LOG_LEVEL: &str = "ENGAGEMENT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ENGAGEMENT_LOG_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidOverride {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// File path, or `:memory:`.
    pub path: String,
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "engagement.db".to_string(),
            pool_size: 4,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.trim() == IN_MEMORY_DB_PATH
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: 3_000,
        }
    }
}

impl StoreConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub exchange: String,
    pub queue_capacity: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            exchange: "engagement".to_string(),
            queue_capacity: 1024,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl EventsConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rotated log files; stderr when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Top-level configuration of the engagement runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

impl EngagementConfig {
    /// Reads `path`, applies environment overrides, and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path.as_ref())?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by the `ENGAGEMENT_*` names.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.database.path = value;
        }
        if let Some(value) = lookup(ENV_DB_POOL_SIZE) {
            self.database.pool_size = parse_override(ENV_DB_POOL_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_OP_TIMEOUT_MS) {
            self.store.op_timeout_ms = parse_override(ENV_OP_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_EXCHANGE) {
            self.events.exchange = value;
        }
        if let Some(value) = lookup(ENV_EVENT_QUEUE_CAPACITY) {
            self.events.queue_capacity = parse_override(ENV_EVENT_QUEUE_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.logging.dir = if value.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(invalid("database.path", "must not be empty"));
        }
        if self.database.pool_size == 0 {
            return Err(invalid("database.pool_size", "must be at least 1"));
        }
        if self.store.op_timeout_ms == 0 {
            return Err(invalid("store.op_timeout_ms", "must be greater than 0"));
        }
        if self.store.op_timeout() > MAX_BUSY_TIMEOUT {
            return Err(invalid(
                "store.op_timeout_ms",
                format!("must be at most {}", MAX_BUSY_TIMEOUT.as_millis()),
            ));
        }
        if self.events.exchange.trim().is_empty() {
            return Err(invalid("events.exchange", "must not be empty"));
        }
        if self.events.queue_capacity == 0 {
            return Err(invalid("events.queue_capacity", "must be at least 1"));
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(invalid(
                    "logging.dir",
                    format!("must be an absolute path, got `{}`", dir.display()),
                ));
            }
        }
        Ok(())
    }
}

fn parse_override<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| ConfigError::InvalidOverride {
            key,
            value: value.to_string(),
            reason: err.to_string(),
        })
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
