//! Application configuration module
//!
//! Type-safe configuration loaded with the `config` and `dotenvy` crates.
//! Sources, later ones overriding earlier ones:
//!
//! 1. `.env` in the working directory (development)
//! 2. `role-warden.{toml,yaml,json}`, or the file named by `ROLE_WARDEN_CONFIG`
//! 3. Environment variables prefixed `ROLE_WARDEN`, nested with `__`
//!
//! # Example
//!
//! ```no_run
//! use role_warden::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Reconciling guild {}", config.platform.guild_id);
//! ```

mod audit;
mod database;
mod error;
mod features;
mod platform;
mod reconciliation;
mod retry;

pub use audit::AuditConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use platform::PlatformConfig;
pub use reconciliation::{CooldownEntry, ReconciliationConfig};
pub use retry::RetryConfig;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::application::executor::ExecutorConfig;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_VAR: &str = "ROLE_WARDEN_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "role-warden";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory platform API (guild, token, caching)
    pub platform: PlatformConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub features: FeatureFlags,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment.
    ///
    /// # Environment Variable Format
    ///
    /// - `ROLE_WARDEN__PLATFORM__GUILD_ID=...` -> `platform.guild_id = ...`
    /// - `ROLE_WARDEN__RECONCILIATION__OPERATION_CONCURRENCY=5`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required values are missing or cannot be
    /// parsed, or if an explicitly named file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => config::File::with_name(&path).required(true),
            Err(_) => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::default()
                    .prefix("ROLE_WARDEN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.platform.validate()?;
        self.database.validate()?;
        self.audit.validate()?;
        self.reconciliation.validate()?;
        self.retry.validate()?;
        EnvFilter::try_new(&self.log_level)
            .map_err(|_| ValidationError::InvalidLogLevel(self.log_level.clone()))?;
        Ok(())
    }

    /// Executor settings from the reconciliation and retry sections.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_concurrency(self.reconciliation.concurrency())
            .with_retry(self.retry.policy())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("ROLE_WARDEN__PLATFORM__GUILD_ID", "81384788765712384");
        env::set_var("ROLE_WARDEN__PLATFORM__BOT_TOKEN", "bot-token");
        env::set_var("ROLE_WARDEN__DATABASE__URL", "postgresql://test@localhost/test");
    }

    fn clear_env() {
        env::remove_var("ROLE_WARDEN__PLATFORM__GUILD_ID");
        env::remove_var("ROLE_WARDEN__PLATFORM__BOT_TOKEN");
        env::remove_var("ROLE_WARDEN__DATABASE__URL");
        env::remove_var("ROLE_WARDEN__RECONCILIATION__OPERATION_CONCURRENCY");
        env::remove_var("ROLE_WARDEN__FEATURES__ENABLE_WATCHDOG");
        env::remove_var("ROLE_WARDEN__LOG_LEVEL");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.platform.guild_id, "81384788765712384");
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_apply_to_omitted_sections() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.reconciliation.concurrency(), 3);
        assert_eq!(config.retry.max_attempts, 6);
        assert!(config.features.enable_watchdog);
        assert!(config.audit.webhook_url.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ROLE_WARDEN__RECONCILIATION__OPERATION_CONCURRENCY", "5");
        env::set_var("ROLE_WARDEN__FEATURES__ENABLE_WATCHDOG", "false");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.executor_config().concurrency, 5);
        assert!(!config.features.enable_watchdog);
    }

    #[test]
    fn test_missing_platform_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("ROLE_WARDEN__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_level_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ROLE_WARDEN__LOG_LEVEL", "role_warden=loud");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidLogLevel(_))
        ));
    }
}
