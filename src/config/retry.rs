//! Retry policy configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::executor::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per operation, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum wait after a rate-limit response
    #[serde(default = "default_rate_limit_floor")]
    pub rate_limit_floor_ms: u64,

    /// Transient waits grow linearly from this base
    #[serde(default = "default_transient_base")]
    pub transient_base_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_floor_ms: default_rate_limit_floor(),
            transient_base_ms: default_transient_base(),
            jitter_ms: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_rate_limit_floor(Duration::from_millis(self.rate_limit_floor_ms))
            .with_transient_base(Duration::from_millis(self.transient_base_ms))
            .with_jitter(Duration::from_millis(self.jitter_ms))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidRetry("max_attempts must be at least 1"));
        }
        if self.max_attempts > 6 {
            return Err(ValidationError::InvalidRetry("max_attempts may not exceed 6"));
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    6
}

fn default_rate_limit_floor() -> u64 {
    1000
}

fn default_transient_base() -> u64 {
    500
}

fn default_jitter() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_budget_is_bounded() {
        let zero = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let seven = RetryConfig {
            max_attempts: 7,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(seven.validate().is_err());
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn policy_carries_configured_budget() {
        let config = RetryConfig {
            max_attempts: 2,
            ..Default::default()
        };
        assert_eq!(config.policy().max_attempts, 2);
    }
}
