//! Feature flags configuration

use serde::Deserialize;

/// Switches for the background services and log output.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "enabled")]
    pub enable_watchdog: bool,

    #[serde(default = "enabled")]
    pub enable_expiry_sweeper: bool,

    /// Remove memberships of subjects who left the roster long ago.
    #[serde(default = "enabled")]
    pub enable_stale_cleanup: bool,

    /// Run the first watchdog tick in accept mode.
    #[serde(default = "enabled")]
    pub enable_startup_accept: bool,

    #[serde(default)]
    pub json_logs: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_watchdog: true,
            enable_expiry_sweeper: true,
            enable_stale_cleanup: true,
            enable_startup_accept: true,
            json_logs: false,
        }
    }
}

fn enabled() -> bool {
    true
}
