//! Error types for the caregate registry.
//!
//! Only construction and configuration paths can fail. Probe failures are
//! never errors: they become `unhealthy` records.

use thiserror::Error;

/// Result type alias for registry construction and configuration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while configuring a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid duration {0:?} (expected e.g. \"500ms\", \"5s\", \"2m\")")]
    InvalidDuration(String),

    #[error("invalid service url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}
