//! Departure tracking port.
//!
//! Answers when a subject was last observed leaving the roster. The
//! producer of these facts (a presence tracker listening to leave events)
//! lives outside this crate; stale-membership cleanup only consumes them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubjectId, Timestamp};

#[async_trait]
pub trait DepartureTracker: Send + Sync {
    /// When the subject was last seen leaving, or `None` if never recorded.
    async fn last_departure(&self, subject: &SubjectId) -> Result<Option<Timestamp>, DomainError>;
}
