//! Drift detection and repair between external roles and local records.
//!
//! - `MembershipSynchronizer` - membership from external base roles
//! - `CooldownEnforcer` - cooldown role flag vs local expiry record
//! - `StaleMembershipCleaner` - memberships of long-departed subjects
//! - `Watchdog` - runs all of the above per tick and reports once

mod enforcer;
mod report;
mod stale;
mod synchronizer;
mod throttle;
mod watchdog;

pub use enforcer::{CooldownEnforcer, CooldownRepair, RepairStatus, DEFAULT_ENFORCER_DEDUP_WINDOW};
pub use report::{TickReport, DEFAULT_DRIFT_SAMPLE_CAP, TICK_SUMMARY_TITLE};
pub use stale::{StaleCleanupReport, StaleMembershipCleaner, StaleRemoval, DEFAULT_STALE_RETENTION};
pub use synchronizer::{MembershipSynchronizer, SyncOutcome};
pub use throttle::{DiagnosticThrottle, DEFAULT_DIAGNOSTIC_WINDOW};
pub use watchdog::{Watchdog, WatchdogConfig};
