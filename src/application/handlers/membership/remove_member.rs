//! RemoveMemberHandler - Command handler for administrative removal.
//!
//! Removes every role the subject's org maps to, then drops the local
//! membership and archives the previous org. Role removal goes first: if
//! the base role stayed behind, the next watchdog tick would re-create the
//! membership from the roster.

use futures::future::join_all;
use std::sync::Arc;

use crate::application::executor::RoleOperationExecutor;
use crate::domain::audit::AuditEvent;
use crate::domain::foundation::{DomainError, ErrorCode, OrgId, SubjectId, Timestamp};
use crate::domain::org::{LastOrgState, RemovedBy};
use crate::domain::roles::{OperationResult, RoleOperation};
use crate::ports::{
    push_best_effort, AuditSink, LastOrgStateRepository, MembershipRepository, OrgRepository,
};

/// Command to remove a subject from their org.
#[derive(Debug, Clone)]
pub struct RemoveMemberCommand {
    pub subject: SubjectId,
    /// Who asked for the removal; recorded on the archived state.
    pub actor: SubjectId,
}

#[derive(Debug, Clone)]
pub struct RemoveMemberResult {
    pub org_id: OrgId,
    pub role_results: Vec<OperationResult>,
}

/// Handler for removing memberships.
pub struct RemoveMemberHandler {
    orgs: Arc<dyn OrgRepository>,
    memberships: Arc<dyn MembershipRepository>,
    last_org: Arc<dyn LastOrgStateRepository>,
    executor: RoleOperationExecutor,
    audit: Arc<dyn AuditSink>,
}

impl RemoveMemberHandler {
    pub fn new(
        orgs: Arc<dyn OrgRepository>,
        memberships: Arc<dyn MembershipRepository>,
        last_org: Arc<dyn LastOrgStateRepository>,
        executor: RoleOperationExecutor,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            orgs,
            memberships,
            last_org,
            executor,
            audit,
        }
    }

    pub async fn handle(&self, cmd: RemoveMemberCommand) -> Result<RemoveMemberResult, DomainError> {
        // 1. Find the membership
        let membership = self
            .memberships
            .find_by_subject(&cmd.subject)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::MembershipNotFound,
                    format!("Subject {} has no membership", cmd.subject),
                )
            })?;

        // 2. Strip the org's roles
        let roles = match self.orgs.find(&membership.org_id).await? {
            Some(org) => org.all_roles(),
            None => {
                tracing::warn!(
                    subject = %cmd.subject,
                    org_id = %membership.org_id,
                    "membership points at unknown org, no roles to remove"
                );
                Vec::new()
            }
        };

        let reason = format!("removed by {}", cmd.actor);
        let role_results = join_all(roles.into_iter().map(|role| {
            self.executor
                .submit(RoleOperation::remove(cmd.subject.clone(), role, reason.clone()))
        }))
        .await;

        if let Some(failed) = role_results.iter().find(|r| !r.ok) {
            return Err(DomainError::new(
                ErrorCode::RoleOperationFailed,
                format!("Failed to remove org roles: {}", failed.describe_failure()),
            )
            .with_detail("subject", cmd.subject.as_str()));
        }

        // 3. Drop the membership and archive it
        let now = Timestamp::now();
        self.memberships.delete(&cmd.subject).await?;
        let archived =
            LastOrgState::from_membership(&membership, now, RemovedBy::Administrator(cmd.actor.clone()));
        self.last_org.upsert(&archived).await?;

        tracing::info!(subject = %cmd.subject, org_id = %membership.org_id, actor = %cmd.actor, "member removed");
        let event = AuditEvent::info("Member removed")
            .with_fact("subject", &cmd.subject)
            .with_fact("org", membership.org_id)
            .with_fact("actor", &cmd.actor);
        push_best_effort(self.audit.as_ref(), event).await;

        Ok(RemoveMemberResult {
            org_id: membership.org_id,
            role_results,
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
    use crate::domain::org::{Membership, Org, OrgKind, OrgRank};
    use crate::ports::PlatformError;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    fn role(id: &str) -> RoleId {
        RoleId::new(id).unwrap()
    }

    fn subject() -> SubjectId {
        SubjectId::new("42").unwrap()
    }

    fn admin() -> SubjectId {
        SubjectId::new("7").unwrap()
    }

    struct Fixture {
        platform: Arc<InMemoryRolePlatform>,
        store: Arc<InMemoryStore>,
        audit: Arc<RecordingAuditSink>,
        handler: RemoveMemberHandler,
        org: Org,
    }

    async fn fixture() -> Fixture {
        let platform = Arc::new(InMemoryRolePlatform::new(100));
        platform.define_role(role("base"), 5);
        platform.define_role(role("lead"), 6);
        platform.add_member(subject(), vec![role("base"), role("lead")]);

        let org = Org::new("Alpha", OrgKind::Clan, role("base")).with_leader_role(role("lead"));
        let store = Arc::new(InMemoryStore::new());
        OrgRepository::upsert(store.as_ref(), &org).await.unwrap();
        let membership = Membership::new(subject(), org.id, OrgRank::Leader, Timestamp::now());
        MembershipRepository::upsert(store.as_ref(), &membership).await.unwrap();

        let audit = Arc::new(RecordingAuditSink::new());
        let executor = RoleOperationExecutor::new(
            platform.clone(),
            ExecutorConfig::default().with_retry(RetryPolicy::default().with_max_attempts(1)),
        );
        let handler = RemoveMemberHandler::new(
            store.clone(),
            store.clone(),
            store.clone(),
            executor,
            audit.clone(),
        );
        Fixture {
            platform,
            store,
            audit,
            handler,
            org,
        }
    }

    fn command() -> RemoveMemberCommand {
        RemoveMemberCommand {
            subject: subject(),
            actor: admin(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn strips_roles_and_archives_membership() {
        let f = fixture().await;

        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(result.org_id, f.org.id);
        assert!(!f.platform.holds(&subject(), &role("base")));
        assert!(!f.platform.holds(&subject(), &role("lead")));
        assert_eq!(f.store.membership_count(), 0);

        let archived = LastOrgStateRepository::find(f.store.as_ref(), &subject())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.last_org_id, f.org.id);
        assert_eq!(archived.removed_by, RemovedBy::Administrator(admin()));
        assert_eq!(f.audit.events_titled("Member removed").len(), 1);
    }

    #[tokio::test]
    async fn missing_membership_is_not_found() {
        let f = fixture().await;
        MembershipRepository::delete(f.store.as_ref(), &subject()).await.unwrap();

        let err = f.handler.handle(command()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::MembershipNotFound);
        assert_eq!(f.platform.mutation_attempts(), 0);
    }

    #[tokio::test]
    async fn role_failure_keeps_membership() {
        let f = fixture().await;
        f.platform.fail_next_mutations(vec![
            PlatformError::permission_denied("Missing Permissions"),
            PlatformError::permission_denied("Missing Permissions"),
        ]);

        let err = f.handler.handle(command()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::RoleOperationFailed);
        assert_eq!(f.store.membership_count(), 1);
        assert!(LastOrgStateRepository::find(f.store.as_ref(), &subject())
            .await
            .unwrap()
            .is_none());
    }
}
