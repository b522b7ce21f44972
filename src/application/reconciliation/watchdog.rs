//! Drift Reconciler (Watchdog).
//!
//! Runs the membership synchronizer and cooldown enforcer over the whole
//! roster, then the stale membership cleanup, and emits at most one
//! aggregated summary per tick.
//!
//! ## Schedule
//!
//! | tick                          | mode      | authority         |
//! |-------------------------------|-----------|-------------------|
//! | once, after `startup_delay`   | `Accept`  | external roles    |
//! | every `interval` thereafter   | `Enforce` | local records     |
//!
//! The startup tick trusts the platform because edits made while the
//! process was down are newer than the local records.
//!
//! ## Overlap
//!
//! A tick that starts while another is still running is skipped.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, MissedTickBehavior};

use super::enforcer::{CooldownEnforcer, CooldownRepair};
use super::report::{TickReport, DEFAULT_DRIFT_SAMPLE_CAP};
use super::stale::StaleMembershipCleaner;
use super::synchronizer::{MembershipSynchronizer, SyncOutcome};
use crate::domain::cooldown::EnforcementMode;
use crate::domain::foundation::{SubjectId, Timestamp};
use crate::domain::org::Org;
use crate::ports::{push_best_effort, AuditSink, MembershipRepository, OrgRepository, RolePlatform, RosterEntry};

/// Configuration for the Watchdog service.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub startup_delay: Duration,
    pub interval: Duration,
    /// Run the first tick in accept mode.
    pub startup_accept: bool,
    /// Subjects reconciled concurrently; role writes are still bounded by
    /// the executor.
    pub subject_parallelism: usize,
    pub drift_sample_cap: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(15),
            interval: Duration::from_secs(10 * 60),
            startup_accept: true,
            subject_parallelism: 8,
            drift_sample_cap: DEFAULT_DRIFT_SAMPLE_CAP,
        }
    }
}

impl WatchdogConfig {
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_startup_accept(mut self, enabled: bool) -> Self {
        self.startup_accept = enabled;
        self
    }

    pub fn with_drift_sample_cap(mut self, cap: usize) -> Self {
        self.drift_sample_cap = cap;
        self
    }
}

/// Per-subject result gathered before folding into the report.
struct SubjectOutcome {
    subject: SubjectId,
    sync: Result<SyncOutcome, String>,
    sync_line: Option<String>,
    repairs: Vec<CooldownRepair>,
}

pub struct Watchdog {
    platform: Arc<dyn RolePlatform>,
    orgs: Arc<dyn OrgRepository>,
    memberships: Arc<dyn MembershipRepository>,
    synchronizer: MembershipSynchronizer,
    enforcer: CooldownEnforcer,
    stale: Option<StaleMembershipCleaner>,
    audit: Arc<dyn AuditSink>,
    config: WatchdogConfig,
    running: Mutex<()>,
}

impl Watchdog {
    pub fn new(
        platform: Arc<dyn RolePlatform>,
        orgs: Arc<dyn OrgRepository>,
        memberships: Arc<dyn MembershipRepository>,
        synchronizer: MembershipSynchronizer,
        enforcer: CooldownEnforcer,
        audit: Arc<dyn AuditSink>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            platform,
            orgs,
            memberships,
            synchronizer,
            enforcer,
            stale: None,
            audit,
            config,
            running: Mutex::new(()),
        }
    }

    pub fn with_stale_cleanup(mut self, cleaner: StaleMembershipCleaner) -> Self {
        self.stale = Some(cleaner);
        self
    }

    /// Run the startup tick, then periodic ticks, until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            _ = time::sleep(self.config.startup_delay) => {}
            _ = shutdown.changed() => return,
        }

        let first_mode = if self.config.startup_accept {
            EnforcementMode::Accept
        } else {
            EnforcementMode::Enforce
        };
        self.tick(first_mode).await;

        let mut interval = time::interval_at(
            time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("watchdog stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.tick(EnforcementMode::Enforce).await;
                }
            }
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Returns `None` when skipped because another tick is in progress.
    pub async fn tick(&self, mode: EnforcementMode) -> Option<TickReport> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!(mode = %mode, "watchdog tick skipped, previous tick still running");
            return None;
        };

        let now = Timestamp::now();
        let mut report = TickReport::new(mode, self.config.drift_sample_cap);

        let orgs = match self.orgs.list().await {
            Ok(orgs) => orgs,
            Err(e) => {
                report.aborted = Some(format!("org definitions unavailable: {}", e));
                self.finish(&report).await;
                return Some(report);
            }
        };
        self.synchronizer.check_shared_leadership(&orgs);

        let roster = match self.platform.fetch_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                report.aborted = Some(format!("roster unavailable: {}", e));
                self.finish(&report).await;
                return Some(report);
            }
        };
        report.subjects_scanned = roster.len();
        let present: HashSet<SubjectId> = roster.iter().map(|e| e.subject.clone()).collect();

        let outcomes: Vec<SubjectOutcome> = stream::iter(roster)
            .map(|entry| self.reconcile_subject(entry, &orgs, mode, now))
            .buffer_unordered(self.config.subject_parallelism.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match &outcome.sync {
                Ok(sync) => report.record_sync(sync, outcome.sync_line),
                Err(e) => report.record_failure(format!("{}: membership sync failed: {}", outcome.subject, e)),
            }
            for repair in &outcome.repairs {
                report.record_repair(repair);
            }
        }

        if let Some(stale) = &self.stale {
            match stale.cleanup(&present, now).await {
                Ok(cleanup) => {
                    for removal in &cleanup.removed {
                        report.record_stale(removal);
                    }
                    for failure in cleanup.failures {
                        report.record_failure(failure);
                    }
                }
                Err(e) => report.record_failure(format!("stale cleanup failed: {}", e)),
            }
        }

        self.finish(&report).await;
        Some(report)
    }

    async fn reconcile_subject(
        &self,
        entry: RosterEntry,
        orgs: &[Org],
        mode: EnforcementMode,
        now: Timestamp,
    ) -> SubjectOutcome {
        let subject = entry.subject;
        let sync = self
            .synchronizer
            .sync_subject(&subject, &entry.roles, orgs, now)
            .await
            .map_err(|e| e.to_string());
        let sync_line = sync
            .as_ref()
            .ok()
            .and_then(|outcome| outcome.describe(&subject, orgs));

        let current_org = match self.memberships.find_by_subject(&subject).await {
            Ok(membership) => membership.map(|m| m.org_id),
            Err(e) => {
                tracing::debug!(subject = %subject, error = %e, "membership lookup failed, backfill origin unknown");
                None
            }
        };
        let repairs = self
            .enforcer
            .enforce_subject(&subject, &entry.roles, current_org, mode, now)
            .await;

        SubjectOutcome {
            subject,
            sync,
            sync_line,
            repairs,
        }
    }

    async fn finish(&self, report: &TickReport) {
        if !report.has_activity() {
            tracing::debug!(mode = %report.mode, subjects = report.subjects_scanned, "watchdog tick quiet");
            return;
        }

        if let Some(reason) = &report.aborted {
            tracing::warn!(mode = %report.mode, reason = %reason, "watchdog tick aborted");
        } else {
            tracing::info!(
                mode = %report.mode,
                subjects = report.subjects_scanned,
                changes = report.changes(),
                failures = report.failures,
                conflicts = report.conflicts,
                "watchdog tick completed"
            );
        }
        push_best_effort(self.audit.as_ref(), report.to_audit_event()).await;
    }
}
