//! Reconciliation configuration
//!
//! Timing for the watchdog and sweeper, the executor's concurrency, and the
//! cooldown kind to role mapping.

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::executor::clamp_concurrency;
use crate::application::reconciliation::WatchdogConfig;
use crate::application::scheduler::ExpirySweeperConfig;
use crate::domain::cooldown::{CooldownKind, CooldownPolicy};
use crate::domain::foundation::RoleId;

/// One cooldown kind and the external role that mirrors it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CooldownEntry {
    pub kind: String,
    pub role_id: String,
    pub default_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Concurrent role operations; clamped to 1..=10
    #[serde(default = "default_concurrency")]
    pub operation_concurrency: usize,

    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,

    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_minutes: u64,

    #[serde(default = "default_sweeper_interval")]
    pub sweeper_interval_minutes: u64,

    /// How long a departed subject keeps their membership
    #[serde(default = "default_stale_retention")]
    pub stale_retention_minutes: u64,

    #[serde(default = "default_diagnostic_window")]
    pub diagnostic_window_secs: u64,

    #[serde(default = "default_enforcer_dedup")]
    pub enforcer_dedup_secs: u64,

    #[serde(default = "default_drift_sample_cap")]
    pub drift_sample_cap: usize,

    #[serde(default)]
    pub cooldowns: Vec<CooldownEntry>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            operation_concurrency: default_concurrency(),
            startup_delay_secs: default_startup_delay(),
            watchdog_interval_minutes: default_watchdog_interval(),
            sweeper_interval_minutes: default_sweeper_interval(),
            stale_retention_minutes: default_stale_retention(),
            diagnostic_window_secs: default_diagnostic_window(),
            enforcer_dedup_secs: default_enforcer_dedup(),
            drift_sample_cap: default_drift_sample_cap(),
            cooldowns: Vec::new(),
        }
    }
}

impl ReconciliationConfig {
    pub fn concurrency(&self) -> usize {
        clamp_concurrency(self.operation_concurrency)
    }

    pub fn stale_retention(&self) -> Duration {
        Duration::from_secs(self.stale_retention_minutes * 60)
    }

    pub fn diagnostic_window(&self) -> Duration {
        Duration::from_secs(self.diagnostic_window_secs)
    }

    pub fn enforcer_dedup_window(&self) -> Duration {
        Duration::from_secs(self.enforcer_dedup_secs)
    }

    pub fn watchdog_config(&self, startup_accept: bool) -> WatchdogConfig {
        WatchdogConfig::default()
            .with_startup_delay(Duration::from_secs(self.startup_delay_secs))
            .with_interval(Duration::from_secs(self.watchdog_interval_minutes * 60))
            .with_startup_accept(startup_accept)
            .with_drift_sample_cap(self.drift_sample_cap)
    }

    pub fn sweeper_config(&self) -> ExpirySweeperConfig {
        ExpirySweeperConfig::default()
            .with_interval(Duration::from_secs(self.sweeper_interval_minutes * 60))
    }

    /// Typed policies for every configured cooldown kind.
    pub fn policies(&self) -> Result<Vec<CooldownPolicy>, ValidationError> {
        let mut seen = HashSet::new();
        let mut policies = Vec::with_capacity(self.cooldowns.len());

        for entry in &self.cooldowns {
            let kind = CooldownKind::new(entry.kind.clone())
                .map_err(|e| ValidationError::InvalidCooldown(e.to_string()))?;
            if !seen.insert(kind.clone()) {
                return Err(ValidationError::DuplicateCooldownKind(entry.kind.clone()));
            }
            let role = RoleId::new(entry.role_id.clone())
                .map_err(|e| ValidationError::InvalidCooldown(e.to_string()))?;
            if entry.default_minutes == 0 {
                return Err(ValidationError::InvalidCooldown(format!(
                    "'{}' has a zero default duration",
                    entry.kind
                )));
            }
            policies.push(CooldownPolicy::new(
                kind,
                role,
                Duration::from_secs(entry.default_minutes * 60),
            ));
        }

        Ok(policies)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.watchdog_interval_minutes == 0 {
            return Err(ValidationError::ZeroDuration("reconciliation.watchdog_interval_minutes"));
        }
        if self.sweeper_interval_minutes == 0 {
            return Err(ValidationError::ZeroDuration("reconciliation.sweeper_interval_minutes"));
        }
        if self.stale_retention_minutes == 0 {
            return Err(ValidationError::ZeroDuration("reconciliation.stale_retention_minutes"));
        }
        self.policies().map(|_| ())
    }
}

fn default_concurrency() -> usize {
    3
}

fn default_startup_delay() -> u64 {
    15
}

fn default_watchdog_interval() -> u64 {
    10
}

fn default_sweeper_interval() -> u64 {
    1
}

fn default_stale_retention() -> u64 {
    1440
}

fn default_diagnostic_window() -> u64 {
    120
}

fn default_enforcer_dedup() -> u64 {
    10
}

fn default_drift_sample_cap() -> usize {
    15
}
