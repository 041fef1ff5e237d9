//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::credential::MIN_SECRET_LENGTH;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("credentials.secret_length must be at least {min}, got {0}", min = MIN_SECRET_LENGTH)]
    SecretTooShort(usize),
    #[error("credentials argon2 parameters rejected: {0}")]
    InvalidHashParams(argon2::Error),
    #[error("sweeper.interval_secs must be greater than zero")]
    ZeroSweepInterval,
    #[error("sweeper.batch_size must be greater than zero")]
    ZeroSweepBatch,
    #[error("database.path is required")]
    MissingDatabasePath,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let creds = &config.credentials;
    if creds.secret_length < MIN_SECRET_LENGTH {
        errors.push(ValidationError::SecretTooShort(creds.secret_length));
    }
    if let Err(e) = argon2::Params::new(creds.memory_cost, creds.time_cost, creds.parallelism, None)
    {
        errors.push(ValidationError::InvalidHashParams(e));
    }

    if config.sweeper.interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.sweeper.batch_size == 0 {
        errors.push(ValidationError::ZeroSweepBatch);
    }

    let db = &config.database;
    if db.path.is_empty() {
        errors.push(ValidationError::MissingDatabasePath);
    } else if db.path != ":memory:" {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_memory_database_passes() {
        let config: Config = r#"
[database]
path = ":memory:"
"#
        .parse()
        .unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let config: Config = r#"
[database]
path = "/definitely/not/here/actions.db"

[credentials]
secret_length = 8
time_cost = 0

[sweeper]
interval_secs = 0
batch_size = 0
"#
        .parse()
        .unwrap();

        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::SecretTooShort(8))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidHashParams(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroSweepInterval)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroSweepBatch)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }

    #[test]
    fn test_empty_database_path_fails() {
        let config: Config = r#"
[database]
path = ""
"#
        .parse()
        .unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingDatabasePath)));
    }
}
