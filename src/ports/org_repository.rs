//! Org definition repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrgId};
use crate::domain::org::Org;

#[async_trait]
pub trait OrgRepository: Send + Sync {
    async fn find(&self, id: &OrgId) -> Result<Option<Org>, DomainError>;

    /// All org definitions, active or not.
    async fn list(&self) -> Result<Vec<Org>, DomainError>;

    async fn upsert(&self, org: &Org) -> Result<(), DomainError>;

    async fn delete(&self, id: &OrgId) -> Result<bool, DomainError>;
}
