//! Expiry Sweeper - Background service that retires expired cooldowns.
//!
//! Expiry is not self-enforcing. Each sweep finds records whose
//! `expires_at` has passed, removes the mirrored role through the executor
//! and deletes the record once the role is confirmed gone. A record whose
//! role removal fails stays in place and is retried on the next sweep.
//! The delete is conditional on the `expires_at` that was read, so a
//! cooldown re-applied while the removal was in flight is kept.
//!
//! The sweeper runs independently of the watchdog so expired records are
//! retired even when the watchdog is disabled or delayed.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |
//! | `parallelism` | 8 | Records processed concurrently |

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::application::executor::RoleOperationExecutor;
use crate::domain::audit::AuditEvent;
use crate::domain::cooldown::{Cooldown, CooldownPolicy};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::roles::RoleOperation;
use crate::ports::{push_best_effort, AuditSink, CooldownRepository};

pub const COOLDOWN_EXPIRED_TITLE: &str = "Cooldown expired";
pub const COOLDOWN_EXPIRY_FAILED_TITLE: &str = "Cooldown expiry failed";

#[derive(Debug, Clone)]
pub struct ExpirySweeperConfig {
    pub interval: Duration,
    pub parallelism: usize,
}

impl Default for ExpirySweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            parallelism: 8,
        }
    }
}

impl ExpirySweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Counts from one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub cleared: usize,
    pub failed: usize,
    /// Records of a kind with no configured role; left untouched.
    pub unknown_kind: usize,
    /// Records re-applied while their removal was in flight; kept.
    pub renewed: usize,
}

enum SweepOutcome {
    Cleared,
    Failed,
    UnknownKind,
    Renewed,
}

pub struct ExpirySweeper {
    cooldowns: Arc<dyn CooldownRepository>,
    executor: RoleOperationExecutor,
    policies: Vec<CooldownPolicy>,
    audit: Arc<dyn AuditSink>,
    config: ExpirySweeperConfig,
}

impl ExpirySweeper {
    pub fn new(
        cooldowns: Arc<dyn CooldownRepository>,
        executor: RoleOperationExecutor,
        policies: Vec<CooldownPolicy>,
        audit: Arc<dyn AuditSink>,
        config: ExpirySweeperConfig,
    ) -> Self {
        Self {
            cooldowns,
            executor,
            policies,
            audit,
            config,
        }
    }

    /// Sweep on a fixed interval until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("expiry sweeper stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once(Timestamp::now()).await {
                        tracing::warn!(error = %e, "expiry sweep failed");
                    }
                }
            }
        }
    }

    /// Process every record expired at `now`.
    ///
    /// Only the initial scan can fail; per-record failures are reported
    /// in the result and to the audit sink.
    pub async fn sweep_once(&self, now: Timestamp) -> Result<SweepReport, DomainError> {
        let expired = self.cooldowns.find_expired(now).await?;
        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<SweepOutcome> = stream::iter(expired)
            .map(|record| self.retire(record))
            .buffer_unordered(self.config.parallelism.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                SweepOutcome::Cleared => report.cleared += 1,
                SweepOutcome::Failed => report.failed += 1,
                SweepOutcome::UnknownKind => report.unknown_kind += 1,
                SweepOutcome::Renewed => report.renewed += 1,
            }
        }

        tracing::info!(
            expired = report.expired,
            cleared = report.cleared,
            failed = report.failed,
            unknown_kind = report.unknown_kind,
            renewed = report.renewed,
            "expiry sweep completed"
        );
        Ok(report)
    }

    async fn retire(&self, record: Cooldown) -> SweepOutcome {
        let Some(policy) = self.policies.iter().find(|p| p.kind == record.kind) else {
            tracing::warn!(subject = %record.subject, kind = %record.kind, "expired cooldown has no configured role");
            return SweepOutcome::UnknownKind;
        };

        let op = RoleOperation::remove(
            record.subject.clone(),
            policy.role.clone(),
            format!("{} cooldown expired", record.kind),
        );
        let result = self.executor.submit(op).await;

        if !result.ok {
            let reason = result.describe_failure();
            tracing::warn!(subject = %record.subject, kind = %record.kind, reason = %reason, "expired cooldown role removal failed");
            let event = AuditEvent::warning(COOLDOWN_EXPIRY_FAILED_TITLE)
                .with_fact("subject", &record.subject)
                .with_fact("kind", &record.kind)
                .with_fact("reason", reason);
            push_best_effort(self.audit.as_ref(), event).await;
            return SweepOutcome::Failed;
        }

        match self
            .cooldowns
            .delete_if_expires_at(&record.subject, &record.kind, record.expires_at)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(subject = %record.subject, kind = %record.kind, "cooldown renewed during expiry, record kept");
                return SweepOutcome::Renewed;
            }
            Err(e) => {
                tracing::warn!(subject = %record.subject, kind = %record.kind, error = %e, "failed to delete expired cooldown");
                return SweepOutcome::Failed;
            }
        }

        let role_outcome = if result.skipped {
            "already absent"
        } else {
            "removed"
        };
        let event = AuditEvent::info(COOLDOWN_EXPIRED_TITLE)
            .with_fact("subject", &record.subject)
            .with_fact("kind", &record.kind)
            .with_fact("role", role_outcome)
            .with_fact("expired_at", record.expires_at);
        push_best_effort(self.audit.as_ref(), event).await;
        SweepOutcome::Cleared
    }
}
