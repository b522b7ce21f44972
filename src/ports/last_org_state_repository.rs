//! Last-org history port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubjectId};
use crate::domain::org::LastOrgState;

#[async_trait]
pub trait LastOrgStateRepository: Send + Sync {
    async fn find(&self, subject: &SubjectId) -> Result<Option<LastOrgState>, DomainError>;

    /// Insert or replace the history pointer for `state.subject`.
    async fn upsert(&self, state: &LastOrgState) -> Result<(), DomainError>;

    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError>;
}
