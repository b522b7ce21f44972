//! Audit sink port.
//!
//! Delivery is best-effort. Callers go through [`push_best_effort`], which
//! logs and swallows failures; nothing in reconciliation depends on an audit
//! event arriving.

use async_trait::async_trait;

use crate::domain::audit::AuditEvent;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn push(&self, event: AuditEvent) -> Result<(), DomainError>;
}

/// Push an event, logging instead of propagating any failure.
pub async fn push_best_effort(sink: &dyn AuditSink, event: AuditEvent) {
    let title = event.title.clone();
    if let Err(e) = sink.push(event).await {
        tracing::warn!(title = %title, error = %e, "audit push failed");
    }
}
