//! Configuration validation utilities.

use super::ConfigError;
use super::models::*;
use crate::storage::StoreConfig;

/// Validate the entire configuration.
pub fn validate_config(config: &EngramConfig) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config {
        StoreConfig::Kv { path } | StoreConfig::Relational { path } => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError("store path cannot be empty".to_string()));
            }
        }
        StoreConfig::Vector { path, dimension, table, .. } => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError("store path cannot be empty".to_string()));
            }
            if *dimension == 0 {
                return Err(ConfigError::ValidationError("vector dimension must be greater than 0".to_string()));
            }
            if table.trim().is_empty() {
                return Err(ConfigError::ValidationError("vector table name cannot be empty".to_string()));
            }
        }
        StoreConfig::Memory => {}
    }
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if config.sampling_rate == 0 {
        return Err(ConfigError::ValidationError("logging sampling_rate must be at least 1".to_string()));
    }
    if let Some(file) = &config.file
        && file.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError("logging file path cannot be empty".to_string()));
    }
    Ok(())
}
