//! Cooldown Enforcer.
//!
//! For every configured cooldown kind, compares the presence of the
//! mirrored external role with the local record and applies the repair the
//! decision table asks for. Role changes go through the executor; record
//! changes go straight to the store. Nothing here retries: a failed repair
//! is reported and picked up again on the next tick.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::application::executor::RoleOperationExecutor;
use crate::domain::cooldown::{
    decide_cooldown_action, Cooldown, CooldownAction, CooldownKind, CooldownPolicy,
    EnforcementMode,
};
use crate::domain::foundation::{OrgId, RoleId, SubjectId, Timestamp};
use crate::domain::roles::RoleOperation;
use crate::ports::CooldownRepository;

pub const DEFAULT_ENFORCER_DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// How a single repair ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairStatus {
    Applied,
    /// The same repair ran for this pair moments ago.
    Suppressed,
    /// The record changed while the repair was in flight and was kept.
    Superseded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownRepair {
    pub subject: SubjectId,
    pub kind: CooldownKind,
    pub action: CooldownAction,
    pub status: RepairStatus,
}

impl CooldownRepair {
    pub fn describe(&self) -> String {
        let what = match self.action {
            CooldownAction::Backfill => "role present without record, backfilled",
            CooldownAction::Cleanup => "record expired with role present, cleaned up",
            CooldownAction::Restore => "role missing for active record, restored",
            CooldownAction::DropLocal => "role removed externally, record dropped",
            CooldownAction::None => "in agreement",
        };
        match &self.status {
            RepairStatus::Failed(reason) => {
                format!("{} [{}]: {} FAILED ({})", self.subject, self.kind, what, reason)
            }
            RepairStatus::Suppressed => {
                format!("{} [{}]: {} suppressed (repeat within window)", self.subject, self.kind, what)
            }
            RepairStatus::Superseded => {
                format!("{} [{}]: {} skipped, record renewed meanwhile", self.subject, self.kind, what)
            }
            _ => format!("{} [{}]: {}", self.subject, self.kind, what),
        }
    }
}

type DedupKey = (SubjectId, CooldownKind, CooldownAction);

pub struct CooldownEnforcer {
    cooldowns: Arc<dyn CooldownRepository>,
    executor: RoleOperationExecutor,
    policies: Vec<CooldownPolicy>,
    dedup_window: Duration,
    recent: Mutex<HashMap<DedupKey, Instant>>,
}

impl CooldownEnforcer {
    pub fn new(
        cooldowns: Arc<dyn CooldownRepository>,
        executor: RoleOperationExecutor,
        policies: Vec<CooldownPolicy>,
    ) -> Self {
        Self {
            cooldowns,
            executor,
            policies,
            dedup_window: DEFAULT_ENFORCER_DEDUP_WINDOW,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn policies(&self) -> &[CooldownPolicy] {
        &self.policies
    }

    pub fn policy_for(&self, kind: &CooldownKind) -> Option<&CooldownPolicy> {
        self.policies.iter().find(|p| &p.kind == kind)
    }

    /// Reconcile every configured kind for one subject.
    ///
    /// `current_org` becomes the origin of any backfilled record. Only
    /// pairs that needed a repair appear in the result.
    pub async fn enforce_subject(
        &self,
        subject: &SubjectId,
        roles: &HashSet<RoleId>,
        current_org: Option<OrgId>,
        mode: EnforcementMode,
        now: Timestamp,
    ) -> Vec<CooldownRepair> {
        let mut repairs = Vec::new();
        for policy in &self.policies {
            if let Some(repair) = self
                .enforce_one(subject, policy, roles.contains(&policy.role), current_org, mode, now)
                .await
            {
                repairs.push(repair);
            }
        }
        repairs
    }

    async fn enforce_one(
        &self,
        subject: &SubjectId,
        policy: &CooldownPolicy,
        role_present: bool,
        current_org: Option<OrgId>,
        mode: EnforcementMode,
        now: Timestamp,
    ) -> Option<CooldownRepair> {
        let record = match self.cooldowns.find(subject, &policy.kind).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(subject = %subject, kind = %policy.kind, error = %e, "failed to load cooldown");
                return None;
            }
        };

        let action = decide_cooldown_action(role_present, record.as_ref(), now, mode);
        if action == CooldownAction::None {
            return None;
        }

        let repair = |status| CooldownRepair {
            subject: subject.clone(),
            kind: policy.kind.clone(),
            action,
            status,
        };

        if !self.claim((subject.clone(), policy.kind.clone(), action)) {
            tracing::debug!(subject = %subject, kind = %policy.kind, action = %action, "repair suppressed by dedup window");
            return Some(repair(RepairStatus::Suppressed));
        }

        let observed = record.as_ref().map(|r| r.expires_at);
        let status = match self
            .apply(subject, policy, action, observed, current_org, mode, now)
            .await
        {
            Ok(RepairStatus::Superseded) => {
                tracing::info!(subject = %subject, kind = %policy.kind, action = %action, "cooldown renewed during repair, record kept");
                RepairStatus::Superseded
            }
            Ok(status) => {
                tracing::info!(subject = %subject, kind = %policy.kind, action = %action, mode = %mode, "cooldown drift repaired");
                status
            }
            Err(reason) => {
                tracing::warn!(subject = %subject, kind = %policy.kind, action = %action, reason = %reason, "cooldown repair failed");
                RepairStatus::Failed(reason)
            }
        };
        Some(repair(status))
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        subject: &SubjectId,
        policy: &CooldownPolicy,
        action: CooldownAction,
        observed: Option<Timestamp>,
        current_org: Option<OrgId>,
        mode: EnforcementMode,
        now: Timestamp,
    ) -> Result<RepairStatus, String> {
        match action {
            CooldownAction::None => Ok(RepairStatus::Applied),
            CooldownAction::Backfill => {
                let record = Cooldown::new(
                    subject.clone(),
                    policy.kind.clone(),
                    policy.default_duration,
                    current_org,
                    now,
                );
                self.cooldowns
                    .upsert(&record)
                    .await
                    .map(|()| RepairStatus::Applied)
                    .map_err(|e| e.to_string())
            }
            CooldownAction::Cleanup => {
                let op = RoleOperation::remove(
                    subject.clone(),
                    policy.role.clone(),
                    format!("{} cooldown expired", policy.kind),
                );
                let result = self.executor.submit(op).await;
                if !result.ok {
                    return Err(result.describe_failure());
                }
                self.delete_observed(subject, &policy.kind, observed).await
            }
            CooldownAction::Restore => {
                let op = RoleOperation::add(
                    subject.clone(),
                    policy.role.clone(),
                    format!("{} cooldown still active ({} reconciliation)", policy.kind, mode),
                );
                let result = self.executor.submit(op).await;
                if result.ok {
                    Ok(RepairStatus::Applied)
                } else {
                    Err(result.describe_failure())
                }
            }
            CooldownAction::DropLocal => self.delete_observed(subject, &policy.kind, observed).await,
        }
    }

    /// Deletes the record only if it still carries the `expires_at` the
    /// decision was made on.
    async fn delete_observed(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
        observed: Option<Timestamp>,
    ) -> Result<RepairStatus, String> {
        let Some(expires_at) = observed else {
            return Ok(RepairStatus::Superseded);
        };
        match self.cooldowns.delete_if_expires_at(subject, kind, expires_at).await {
            Ok(true) => Ok(RepairStatus::Applied),
            Ok(false) => Ok(RepairStatus::Superseded),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Records the repair as taken; `false` if it was already taken within
    /// the dedup window.
    fn claim(&self, key: DedupKey) -> bool {
        let now = Instant::now();
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.retain(|_, at| now.duration_since(*at) < self.dedup_window);
        if recent.contains_key(&key) {
            return false;
        }
        recent.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::platform::InMemoryRolePlatform;
    use crate::application::executor::{ExecutorConfig, RetryPolicy};
    use crate::ports::PlatformError;

    fn subject() -> SubjectId {
        SubjectId::new("7").unwrap()
    }

    fn kind() -> CooldownKind {
        CooldownKind::new("org_leave").unwrap()
    }

    fn cd_role() -> RoleId {
        RoleId::new("cd-leave").unwrap()
    }

    struct Fixture {
        platform: Arc<InMemoryRolePlatform>,
        store: Arc<InMemoryStore>,
        enforcer: CooldownEnforcer,
    }

    fn fixture(dedup: Duration) -> Fixture {
        let platform = Arc::new(InMemoryRolePlatform::new(100));
        platform.define_role(cd_role(), 1);
        let store = Arc::new(InMemoryStore::new());
        let executor = RoleOperationExecutor::new(
            platform.clone(),
            ExecutorConfig::default().with_retry(RetryPolicy::default().with_max_attempts(1)),
        );
        let enforcer = CooldownEnforcer::new(
            store.clone(),
            executor,
            vec![CooldownPolicy::new(kind(), cd_role(), Duration::from_secs(3600))],
        )
        .with_dedup_window(dedup);
        Fixture {
            platform,
            store,
            enforcer,
        }
    }

    fn roles_of(platform: &InMemoryRolePlatform) -> HashSet<RoleId> {
        if platform.holds(&subject(), &cd_role()) {
            HashSet::from([cd_role()])
        } else {
            HashSet::new()
        }
    }

    async fn seed_record(store: &InMemoryStore, expires_in_minutes: i64) {
        let now = Timestamp::now();
        let mut record = Cooldown::new(subject(), kind(), Duration::ZERO, None, now);
        record.expires_at = now.plus_minutes(expires_in_minutes);
        CooldownRepository::upsert(store, &record).await.unwrap();
    }

    #[tokio::test]
    async fn role_without_record_is_backfilled_with_origin() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![cd_role()]);
        let origin = OrgId::new();

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &roles_of(&f.platform), Some(origin), EnforcementMode::Enforce, Timestamp::now())
            .await;

        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].action, CooldownAction::Backfill);
        assert_eq!(repairs[0].status, RepairStatus::Applied);
        let record = CooldownRepository::find(f.store.as_ref(), &subject(), &kind())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.origin_org, Some(origin));
        assert_eq!(f.platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn expired_record_with_role_is_cleaned_up() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![cd_role()]);
        seed_record(&f.store, -1).await;

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &roles_of(&f.platform), None, EnforcementMode::Enforce, Timestamp::now())
            .await;

        assert_eq!(repairs[0].action, CooldownAction::Cleanup);
        assert!(!f.platform.holds(&subject(), &cd_role()));
        assert_eq!(f.store.cooldown_count(), 0);
    }

    #[tokio::test]
    async fn enforce_mode_restores_missing_role() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![]);
        seed_record(&f.store, 30).await;

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &roles_of(&f.platform), None, EnforcementMode::Enforce, Timestamp::now())
            .await;

        assert_eq!(repairs[0].action, CooldownAction::Restore);
        assert!(f.platform.holds(&subject(), &cd_role()));
        assert_eq!(f.store.cooldown_count(), 1);
    }

    #[tokio::test]
    async fn accept_mode_drops_record_without_touching_roles() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![]);
        seed_record(&f.store, 30).await;

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &roles_of(&f.platform), None, EnforcementMode::Accept, Timestamp::now())
            .await;

        assert_eq!(repairs[0].action, CooldownAction::DropLocal);
        assert_eq!(f.store.cooldown_count(), 0);
        assert_eq!(f.platform.mutation_attempts(), 0);
    }

    #[tokio::test]
    async fn expired_record_without_role_is_left_alone() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![]);
        seed_record(&f.store, -5).await;

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &HashSet::new(), None, EnforcementMode::Enforce, Timestamp::now())
            .await;

        assert!(repairs.is_empty());
        assert_eq!(f.store.cooldown_count(), 1);
    }

    #[tokio::test]
    async fn repeated_repair_within_window_is_suppressed() {
        let f = fixture(Duration::from_secs(60));
        f.platform.add_member(subject(), vec![]);
        seed_record(&f.store, 30).await;
        let now = Timestamp::now();

        f.enforcer
            .enforce_subject(&subject(), &HashSet::new(), None, EnforcementMode::Enforce, now)
            .await;
        // Stale snapshot still shows the role missing.
        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &HashSet::new(), None, EnforcementMode::Enforce, now)
            .await;

        assert_eq!(repairs[0].status, RepairStatus::Suppressed);
        assert_eq!(f.platform.mutation_count(), 1);
    }

    #[tokio::test]
    async fn failed_cleanup_keeps_record() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![cd_role()]);
        f.platform
            .fail_next_mutations(vec![PlatformError::permission_denied("Missing Permissions")]);
        seed_record(&f.store, -1).await;

        let repairs = f
            .enforcer
            .enforce_subject(&subject(), &roles_of(&f.platform), None, EnforcementMode::Enforce, Timestamp::now())
            .await;

        assert!(matches!(repairs[0].status, RepairStatus::Failed(_)));
        assert!(repairs[0].describe().contains("FAILED"));
        assert_eq!(f.store.cooldown_count(), 1);
    }

    #[tokio::test]
    async fn cleanup_keeps_record_renewed_during_removal() {
        let f = fixture(Duration::from_secs(10));
        f.platform.add_member(subject(), vec![cd_role()]);
        f.platform.set_mutation_delay(Duration::from_millis(60));
        seed_record(&f.store, -1).await;
        let roles = roles_of(&f.platform);

        let renewed = Cooldown::new(subject(), kind(), Duration::from_secs(3600), None, Timestamp::now());
        let reapply = async {
            tokio::time::sleep(Duration::from_millis(15)).await;
            CooldownRepository::upsert(f.store.as_ref(), &renewed).await.unwrap();
        };
        let subj = subject();
        let (repairs, ()) = tokio::join!(
            f.enforcer
                .enforce_subject(&subj, &roles, None, EnforcementMode::Enforce, Timestamp::now()),
            reapply
        );

        assert_eq!(repairs[0].action, CooldownAction::Cleanup);
        assert_eq!(repairs[0].status, RepairStatus::Superseded);
        let kept = CooldownRepository::find(f.store.as_ref(), &subject(), &kind())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.expires_at, renewed.expires_at);
    }
}
