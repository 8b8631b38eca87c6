//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors raised by semantic validation of loaded values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Retrieval top_k must be between 1 and 50")]
    InvalidTopK,

    #[error("Context gather timeout must be between 1 and 30 seconds")]
    InvalidGatherTimeout,

    #[error("Ingestion chunk ceiling must be between 1 and 10000")]
    InvalidChunkCeiling,

    #[error("Session idle timeout must be at least 60 seconds")]
    InvalidIdleTimeout,

    #[error("Sweep interval must be at least 1 second")]
    InvalidSweepInterval,
}
