//! ApplyCooldownHandler - Command handler for recording a cooldown.

use std::sync::Arc;
use std::time::Duration;

use crate::application::executor::RoleOperationExecutor;
use crate::domain::audit::AuditEvent;
use crate::domain::cooldown::{Cooldown, CooldownKind, CooldownPolicy};
use crate::domain::foundation::{DomainError, ErrorCode, OrgId, SubjectId, Timestamp};
use crate::domain::roles::{OperationResult, RoleOperation};
use crate::ports::{push_best_effort, AuditSink, CooldownRepository};

/// Command to put a subject on cooldown.
#[derive(Debug, Clone)]
pub struct ApplyCooldownCommand {
    pub subject: SubjectId,
    pub kind: CooldownKind,
    /// Falls back to the kind's configured default.
    pub duration: Option<Duration>,
    pub origin_org: Option<OrgId>,
}

#[derive(Debug, Clone)]
pub struct ApplyCooldownResult {
    pub cooldown: Cooldown,
    /// Outcome of adding the mirrored role. A failure here leaves the
    /// record in place for the next enforce tick to repair.
    pub role_result: OperationResult,
}

/// Handler for applying cooldowns.
///
/// The record is written first; a store failure aborts before any role is
/// touched.
pub struct ApplyCooldownHandler {
    cooldowns: Arc<dyn CooldownRepository>,
    executor: RoleOperationExecutor,
    policies: Vec<CooldownPolicy>,
    audit: Arc<dyn AuditSink>,
}

impl ApplyCooldownHandler {
    pub fn new(
        cooldowns: Arc<dyn CooldownRepository>,
        executor: RoleOperationExecutor,
        policies: Vec<CooldownPolicy>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            cooldowns,
            executor,
            policies,
            audit,
        }
    }

    pub async fn handle(&self, cmd: ApplyCooldownCommand) -> Result<ApplyCooldownResult, DomainError> {
        // 1. Resolve the mirrored role
        let policy = self
            .policies
            .iter()
            .find(|p| p.kind == cmd.kind)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::UnknownCooldownKind,
                    format!("No role configured for cooldown kind '{}'", cmd.kind),
                )
            })?;

        // 2. Persist the record
        let duration = cmd.duration.unwrap_or(policy.default_duration);
        let cooldown = Cooldown::new(
            cmd.subject.clone(),
            cmd.kind.clone(),
            duration,
            cmd.origin_org,
            Timestamp::now(),
        );
        self.cooldowns.upsert(&cooldown).await?;

        // 3. Mirror it externally
        let role_result = self
            .executor
            .submit(RoleOperation::add(
                cmd.subject.clone(),
                policy.role.clone(),
                format!("{} cooldown applied", cmd.kind),
            ))
            .await;

        let mut event = if role_result.ok {
            AuditEvent::info("Cooldown applied")
        } else {
            AuditEvent::warning("Cooldown applied, role not added")
        }
        .with_fact("subject", &cmd.subject)
        .with_fact("kind", &cmd.kind)
        .with_fact("expires_at", cooldown.expires_at);
        if !role_result.ok {
            event = event.with_fact("reason", role_result.describe_failure());
        }
        push_best_effort(self.audit.as_ref(), event).await;

        Ok(ApplyCooldownResult {
            cooldown,
            role_result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::RecordingAuditSink;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::platform::InMemoryRolePlatform;
    use crate::application::executor::{ExecutorConfig, RetryPolicy};
    use crate::domain::foundation::RoleId;
    use crate::ports::PlatformError;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    fn subject() -> SubjectId {
        SubjectId::new("11").unwrap()
    }

    fn kind() -> CooldownKind {
        CooldownKind::new("org_leave").unwrap()
    }

    fn cd_role() -> RoleId {
        RoleId::new("cd").unwrap()
    }

    fn setup() -> (Arc<InMemoryRolePlatform>, Arc<InMemoryStore>, ApplyCooldownHandler) {
        let platform = Arc::new(InMemoryRolePlatform::new(100));
        platform.define_role(cd_role(), 1);
        platform.add_member(subject(), vec![]);
        let store = Arc::new(InMemoryStore::new());
        let executor = RoleOperationExecutor::new(
            platform.clone(),
            ExecutorConfig::default().with_retry(RetryPolicy::default().with_max_attempts(1)),
        );
        let handler = ApplyCooldownHandler::new(
            store.clone(),
            executor,
            vec![CooldownPolicy::new(kind(), cd_role(), Duration::from_secs(3600))],
            Arc::new(RecordingAuditSink::new()),
        );
        (platform, store, handler)
    }

    fn command(duration: Option<Duration>) -> ApplyCooldownCommand {
        ApplyCooldownCommand {
            subject: subject(),
            kind: kind(),
            duration,
            origin_org: None,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn records_cooldown_and_adds_role() {
        let (platform, store, handler) = setup();

        let result = handler.handle(command(None)).await.unwrap();

        assert!(result.role_result.mutated());
        assert!(platform.holds(&subject(), &cd_role()));
        assert_eq!(store.cooldown_count(), 1);
        let minutes = result
            .cooldown
            .expires_at
            .duration_since(&result.cooldown.created_at)
            .num_minutes();
        assert_eq!(minutes, 60);
    }

    #[tokio::test]
    async fn explicit_duration_overrides_default() {
        let (_platform, _store, handler) = setup();

        let result = handler
            .handle(command(Some(Duration::from_secs(5 * 60))))
            .await
            .unwrap();

        let minutes = result
            .cooldown
            .expires_at
            .duration_since(&result.cooldown.created_at)
            .num_minutes();
        assert_eq!(minutes, 5);
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected() {
        let (_platform, store, handler) = setup();
        let mut cmd = command(None);
        cmd.kind = CooldownKind::new("mystery").unwrap();

        let err = handler.handle(cmd).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::UnknownCooldownKind);
        assert_eq!(store.cooldown_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_aborts_before_role_mutation() {
        let (platform, store, handler) = setup();
        store.fail_writes(true);

        let result = handler.handle(command(None)).await;

        assert!(result.is_err());
        assert_eq!(platform.mutation_attempts(), 0);
    }

    #[tokio::test]
    async fn role_failure_keeps_record() {
        let (platform, store, handler) = setup();
        platform.fail_next_mutations(vec![PlatformError::permission_denied("Missing Permissions")]);

        let result = handler.handle(command(None)).await.unwrap();

        assert!(!result.role_result.ok);
        assert_eq!(store.cooldown_count(), 1);
    }
}
