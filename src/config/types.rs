//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_database_path, default_log_filter, default_memory_cost, default_parallelism,
    default_secret_length, default_sweep_batch, default_sweep_interval, default_time_cost,
    default_true,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Secure actions configuration.
///
/// Every section is optional; an empty document yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Secret minting and hashing cost.
    #[serde(default)]
    pub credentials: CredentialConfig,
    /// Execution engine behavior.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Background sweep cadence.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Optional read cache in front of the store.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Log filter and output format for [`crate::telemetry::init_logging`].
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Secret generation and Argon2id cost parameters.
///
/// Existing hashes keep verifying after these change; the parameters used
/// at minting time are embedded in each stored hash.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// Characters per generated secret (never below 20).
    #[serde(default = "default_secret_length")]
    pub secret_length: usize,
    /// Argon2 memory cost in KiB (default: 19456).
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    /// Argon2 iterations (default: 2).
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Argon2 lanes (default: 1).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            secret_length: default_secret_length(),
            memory_cost: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

/// Execution engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Advance the invocation counter with a conditional write so concurrent
    /// executions can never push it past the limit (default: true).
    ///
    /// When false the counter is incremented unconditionally and racing
    /// callers may overshoot the limit by the number of racers.
    #[serde(default = "default_true")]
    pub strict_limits: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strict_limits: true,
        }
    }
}

/// Sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweeps when using the bundled task (default: 86400).
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Rows read per page; victims are deleted before the next page is read
    /// (default: 500).
    #[serde(default = "default_sweep_batch")]
    pub batch_size: usize,
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            batch_size: default_sweep_batch(),
        }
    }
}

/// Read cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Cache records by id in process memory (default: false).
    #[serde(default)]
    pub enabled: bool,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, fields flattened to the top level.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}
