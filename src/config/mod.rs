//! Layered configuration: defaults, config file, then environment overrides.

mod builder;
mod loader;
mod models;
mod validation;

pub use builder::ConfigBuilder;
pub use loader::ConfigLoader;
pub use models::*;

/// Default configuration file names the loader looks for, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "engram.toml",
    "engram.yaml",
    "engram.yml",
    "engram.json",
    ".engram/config.toml",
    ".engram/config.yaml",
    ".engram/config.yml",
    ".engram/config.json",
];

/// Environment variable prefix, e.g. `ENGRAM_LOGGING.LEVEL=debug`.
pub const ENV_PREFIX: &str = "ENGRAM_";

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration file: {0}")]
    FileLoadError(String),

    #[error("failed to load environment variables: {0}")]
    EnvLoadError(String),

    #[error("configuration validation error: {0}")]
    ValidationError(String),

    #[error("configuration parsing error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for crate::EngramError {
    fn from(err: ConfigError) -> Self {
        crate::EngramError::Configuration(err.to_string())
    }
}
