//! Directory platform configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Connection settings for the directory platform's REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Base URL including the API version
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Guild whose roster is reconciled
    pub guild_id: String,

    /// Bot credential; never logged
    pub bot_token: Secret<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Roster cache lifetime. Zero disables caching.
    #[serde(default = "default_roster_cache")]
    pub roster_cache_secs: u64,

    #[serde(default = "default_role_cache")]
    pub role_cache_secs: u64,
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn roster_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.roster_cache_secs)
    }

    pub fn role_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.role_cache_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidPlatformUrl);
        }
        if self.guild_id.is_empty() {
            return Err(ValidationError::MissingRequired("platform.guild_id"));
        }
        if !self.guild_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidGuildId);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroDuration("platform.request_timeout_secs"));
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_roster_cache() -> u64 {
    30
}

fn default_role_cache() -> u64 {
    60
}
