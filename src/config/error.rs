//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Sampling temperature must be between 0.0 and 2.0")]
    InvalidTemperature,

    #[error("Tool rounds must be between 1 and 10")]
    InvalidToolRounds,

    #[error("Heartbeat interval must be between 1 and 120 seconds")]
    InvalidHeartbeatInterval,

    #[error("Completed-stream retention must not exceed idle retention")]
    InvalidRetention,

    #[error("Subscriber channel capacity must be at least 1")]
    InvalidChannelCapacity,
}
