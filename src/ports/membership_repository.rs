//! Membership repository port.
//!
//! Keyed by subject: the store enforces at most one membership per subject,
//! and `upsert` is an atomic insert-or-update on that key.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubjectId};
use crate::domain::org::Membership;

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Find the membership for a subject.
    ///
    /// Returns `None` if the subject is unaffiliated.
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Membership>, DomainError>;

    /// Every stored membership.
    async fn list_all(&self) -> Result<Vec<Membership>, DomainError>;

    /// Insert or replace the membership for `membership.subject`.
    async fn upsert(&self, membership: &Membership) -> Result<(), DomainError>;

    /// Delete the membership for a subject.
    ///
    /// Returns `true` if a record existed.
    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError>;
}
