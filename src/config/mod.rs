//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and TOML loading
//! - [`defaults`]: Serde default value functions
//! - [`validation`]: Startup validation of loaded values

mod defaults;
mod types;
mod validation;

pub use types::{
    CacheConfig, Config, ConfigError, CredentialConfig, DatabaseConfig, ExecutionConfig,
    LogFormat, LoggingConfig, SweeperConfig,
};
pub use validation::{ValidationError, validate};
