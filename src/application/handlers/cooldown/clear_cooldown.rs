//! ClearCooldownHandler - Command handler for lifting a cooldown early.

use std::sync::Arc;

use crate::application::executor::RoleOperationExecutor;
use crate::domain::audit::AuditEvent;
use crate::domain::cooldown::{CooldownKind, CooldownPolicy};
use crate::domain::foundation::{DomainError, ErrorCode, SubjectId};
use crate::domain::roles::{OperationResult, RoleOperation};
use crate::ports::{push_best_effort, AuditSink, CooldownRepository};

#[derive(Debug, Clone)]
pub struct ClearCooldownCommand {
    pub subject: SubjectId,
    pub kind: CooldownKind,
}

#[derive(Debug, Clone)]
pub struct ClearCooldownResult {
    /// Whether a local record existed.
    pub existed: bool,
    pub role_result: OperationResult,
}

/// Handler for clearing cooldowns.
///
/// The role goes first: the record is only deleted once the role is
/// confirmed absent, so a failure never leaves a role without a record.
pub struct ClearCooldownHandler {
    cooldowns: Arc<dyn CooldownRepository>,
    executor: RoleOperationExecutor,
    policies: Vec<CooldownPolicy>,
    audit: Arc<dyn AuditSink>,
}

impl ClearCooldownHandler {
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

    pub async fn handle(&self, cmd: ClearCooldownCommand) -> Result<ClearCooldownResult, DomainError> {
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

        let role_result = self
            .executor
            .submit(RoleOperation::remove(
                cmd.subject.clone(),
                policy.role.clone(),
                format!("{} cooldown cleared", cmd.kind),
            ))
            .await;
        if !role_result.ok {
            return Err(DomainError::new(
                ErrorCode::RoleOperationFailed,
                format!("Failed to remove cooldown role: {}", role_result.describe_failure()),
            )
            .with_detail("subject", cmd.subject.as_str())
            .with_detail("kind", cmd.kind.as_str()));
        }

        let existed = self.cooldowns.delete(&cmd.subject, &cmd.kind).await?;

        let event = AuditEvent::info("Cooldown cleared")
            .with_fact("subject", &cmd.subject)
            .with_fact("kind", &cmd.kind)
            .with_fact("record", if existed { "deleted" } else { "none" });
        push_best_effort(self.audit.as_ref(), event).await;

        Ok(ClearCooldownResult {
            existed,
            role_result,
        })
    }
}
