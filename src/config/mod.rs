//! Configuration management for rota
//!
//! Configuration comes from environment variables or a TOML file and is
//! validated once at start-up. The resulting [`Config`] is carried in a
//! `SchedulerContext`; nothing reads the environment after that.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling cycle and edit policy
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between two scheduling cycles
    pub cycle_interval_secs: u64,

    /// Events starting earlier than `now - grace_period_secs` can only be
    /// edited by privileged requests
    pub grace_period_secs: i64,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 3600,
            grace_period_secs: 86_400,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/rota.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("pretty"),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cycle_interval_secs = std::env::var("ROTA_CYCLE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.scheduler.cycle_interval_secs);

        let grace_period_secs = std::env::var("ROTA_GRACE_PERIOD_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults.scheduler.grace_period_secs);

        let sqlite_path = std::env::var("ROTA_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let level = std::env::var("ROTA_LOG_LEVEL").unwrap_or(defaults.logging.level);

        let format = std::env::var("ROTA_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            scheduler: SchedulerConfig {
                cycle_interval_secs,
                grace_period_secs,
            },
            database: DatabaseConfig { sqlite_path },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.cycle_interval_secs == 0 {
            return Err(Error::config("cycle_interval_secs must be greater than 0"));
        }

        if self.scheduler.grace_period_secs < 0 {
            return Err(Error::config("grace_period_secs must not be negative"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(Error::config(format!(
                "unknown log format '{}', expected one of: {}",
                self.logging.format,
                LOG_FORMATS.join(", ")
            )));
        }

        Ok(())
    }

    /// Interval between scheduling cycles
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.cycle_interval_secs)
    }

    /// Edit grace period
    #[must_use]
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.scheduler.grace_period_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
