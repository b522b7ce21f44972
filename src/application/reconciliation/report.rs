//! Aggregated outcome of one watchdog tick.

use crate::domain::audit::AuditEvent;
use crate::domain::cooldown::{CooldownAction, EnforcementMode};

use super::enforcer::{CooldownRepair, RepairStatus};
use super::stale::StaleRemoval;
use super::synchronizer::SyncOutcome;

pub const DEFAULT_DRIFT_SAMPLE_CAP: usize = 15;

pub const TICK_SUMMARY_TITLE: &str = "Role watchdog summary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub mode: EnforcementMode,
    pub subjects_scanned: usize,
    pub memberships_joined: usize,
    pub memberships_updated: usize,
    pub memberships_removed: usize,
    pub conflicts: usize,
    pub cooldowns_backfilled: usize,
    pub cooldowns_cleaned: usize,
    pub cooldowns_restored: usize,
    pub cooldowns_dropped: usize,
    pub repairs_suppressed: usize,
    /// Deletes skipped because the record was renewed meanwhile.
    pub repairs_superseded: usize,
    pub stale_removed: usize,
    pub failures: usize,
    /// Set when the tick could not run at all (e.g. roster unavailable).
    pub aborted: Option<String>,
    pub drift_samples: Vec<String>,
    /// Drift lines beyond the sample cap.
    pub drift_overflow: usize,
    sample_cap: usize,
}

impl TickReport {
    pub fn new(mode: EnforcementMode, sample_cap: usize) -> Self {
        Self {
            mode,
            subjects_scanned: 0,
            memberships_joined: 0,
            memberships_updated: 0,
            memberships_removed: 0,
            conflicts: 0,
            cooldowns_backfilled: 0,
            cooldowns_cleaned: 0,
            cooldowns_restored: 0,
            cooldowns_dropped: 0,
            repairs_suppressed: 0,
            repairs_superseded: 0,
            stale_removed: 0,
            failures: 0,
            aborted: None,
            drift_samples: Vec::new(),
            drift_overflow: 0,
            sample_cap,
        }
    }

    pub fn record_drift(&mut self, line: String) {
        if self.drift_samples.len() < self.sample_cap {
            self.drift_samples.push(line);
        } else {
            self.drift_overflow += 1;
        }
    }

    pub fn record_sync(&mut self, outcome: &SyncOutcome, line: Option<String>) {
        match outcome {
            SyncOutcome::Unchanged => return,
            SyncOutcome::Conflict { .. } => {
                // Conflicts are diagnosed through the throttled log only.
                self.conflicts += 1;
                return;
            }
            SyncOutcome::Joined { .. } => self.memberships_joined += 1,
            SyncOutcome::Updated { .. } => self.memberships_updated += 1,
            SyncOutcome::Removed { .. } => self.memberships_removed += 1,
        }
        if let Some(line) = line {
            self.record_drift(line);
        }
    }

    pub fn record_repair(&mut self, repair: &CooldownRepair) {
        match &repair.status {
            RepairStatus::Suppressed => self.repairs_suppressed += 1,
            RepairStatus::Superseded => self.repairs_superseded += 1,
            RepairStatus::Failed(_) => self.failures += 1,
            RepairStatus::Applied => match repair.action {
                CooldownAction::Backfill => self.cooldowns_backfilled += 1,
                CooldownAction::Cleanup => self.cooldowns_cleaned += 1,
                CooldownAction::Restore => self.cooldowns_restored += 1,
                CooldownAction::DropLocal => self.cooldowns_dropped += 1,
                CooldownAction::None => {}
            },
        }
        self.record_drift(repair.describe());
    }

    pub fn record_stale(&mut self, removal: &StaleRemoval) {
        self.stale_removed += 1;
        self.record_drift(format!(
            "{}: membership cleared, absent since {}",
            removal.subject, removal.departed_at
        ));
    }

    pub fn record_failure(&mut self, line: String) {
        self.failures += 1;
        self.record_drift(line);
    }

    pub fn changes(&self) -> usize {
        self.memberships_joined
            + self.memberships_updated
            + self.memberships_removed
            + self.cooldowns_backfilled
            + self.cooldowns_cleaned
            + self.cooldowns_restored
            + self.cooldowns_dropped
            + self.stale_removed
    }

    /// Whether this tick warrants a summary. Standing conflicts alone do
    /// not; every cooldown disagreement, even a suppressed repeat, leaves
    /// a drift line.
    pub fn has_activity(&self) -> bool {
        self.changes() > 0
            || self.failures > 0
            || self.aborted.is_some()
            || !self.drift_samples.is_empty()
    }

    pub fn to_audit_event(&self) -> AuditEvent {
        let mut event = if self.aborted.is_some() || self.failures > 0 {
            AuditEvent::warning(TICK_SUMMARY_TITLE)
        } else {
            AuditEvent::info(TICK_SUMMARY_TITLE)
        };

        event = event
            .with_fact("mode", self.mode)
            .with_fact("subjects", self.subjects_scanned);
        if let Some(reason) = &self.aborted {
            event = event.with_fact("aborted", reason);
        }

        let counters = [
            ("memberships joined", self.memberships_joined),
            ("memberships updated", self.memberships_updated),
            ("memberships removed", self.memberships_removed),
            ("conflicts", self.conflicts),
            ("cooldowns backfilled", self.cooldowns_backfilled),
            ("cooldowns cleaned", self.cooldowns_cleaned),
            ("cooldowns restored", self.cooldowns_restored),
            ("cooldowns dropped", self.cooldowns_dropped),
            ("repairs suppressed", self.repairs_suppressed),
            ("repairs superseded", self.repairs_superseded),
            ("stale removed", self.stale_removed),
            ("failures", self.failures),
        ];
        for (label, count) in counters {
            if count > 0 {
                event = event.with_fact(label, count);
            }
        }

        if !self.drift_samples.is_empty() {
            let mut drift = self.drift_samples.join("\n");
            if self.drift_overflow > 0 {
                drift.push_str(&format!("\n... and {} more", self.drift_overflow));
            }
            event = event.with_fact("drift", drift);
        }
        event
    }
}
