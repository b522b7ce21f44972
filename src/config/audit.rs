//! Audit delivery configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Webhook receiving audit embeds. When absent, events only reach the
    /// tracing log.
    #[serde(default)]
    pub webhook_url: Option<Secret<String>>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.webhook_url {
            if !url.expose_secret().starts_with("https://") {
                return Err(ValidationError::InvalidWebhookUrl);
            }
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}
