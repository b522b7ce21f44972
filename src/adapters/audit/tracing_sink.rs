//! Audit sink that writes events to the log.

use async_trait::async_trait;

use crate::domain::audit::{AuditEvent, Severity};
use crate::domain::foundation::DomainError;
use crate::ports::AuditSink;

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn push(&self, event: AuditEvent) -> Result<(), DomainError> {
        let text = event.render_text();
        match event.severity {
            Severity::Info => tracing::info!(audit_id = %event.id, "{}", text),
            Severity::Warning => tracing::warn!(audit_id = %event.id, "{}", text),
            Severity::Error => tracing::error!(audit_id = %event.id, "{}", text),
        }
        Ok(())
    }
}
