//! Audit sink that keeps every event for assertions.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::domain::audit::AuditEvent;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::AuditSink;

#[derive(Default)]
pub struct RecordingAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every push; events are still not recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().expect("events lock poisoned").clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.read().expect("events lock poisoned").len()
    }

    pub fn events_titled(&self, title: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.title == title)
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().expect("events lock poisoned").clear();
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn push(&self, event: AuditEvent) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(ErrorCode::AuditError, "recording sink set to fail"));
        }
        self.events.write().expect("events lock poisoned").push(event);
        Ok(())
    }
}
