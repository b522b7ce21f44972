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
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid platform API base URL")]
    InvalidPlatformUrl,

    #[error("Guild id must be a numeric snowflake")]
    InvalidGuildId,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Audit webhook URL must use HTTPS")]
    InvalidWebhookUrl,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid retry setting: {0}")]
    InvalidRetry(&'static str),

    #[error("Cooldown kind '{0}' is configured more than once")]
    DuplicateCooldownKind(String),

    #[error("Invalid cooldown entry: {0}")]
    InvalidCooldown(String),

    #[error("Invalid log level filter: {0}")]
    InvalidLogLevel(String),
}
