//! In-memory departure tracker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::foundation::{DomainError, SubjectId, Timestamp};
use crate::ports::DepartureTracker;

/// Departure facts recorded directly by tests.
///
/// # Panics
///
/// Methods may panic if the internal lock is poisoned.
#[derive(Default)]
pub struct InMemoryDepartureTracker {
    departures: RwLock<HashMap<SubjectId, Timestamp>>,
}

impl InMemoryDepartureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_departure(&self, subject: SubjectId, at: Timestamp) {
        self.departures
            .write()
            .expect("departures lock poisoned")
            .insert(subject, at);
    }

    pub fn clear(&self, subject: &SubjectId) {
        self.departures
            .write()
            .expect("departures lock poisoned")
            .remove(subject);
    }
}

#[async_trait]
impl DepartureTracker for InMemoryDepartureTracker {
    async fn last_departure(&self, subject: &SubjectId) -> Result<Option<Timestamp>, DomainError> {
        Ok(self
            .departures
            .read()
            .expect("departures lock poisoned")
            .get(subject)
            .copied())
    }
}
