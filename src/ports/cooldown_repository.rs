//! Cooldown repository port.
//!
//! Keyed by (subject, kind). Expired records are not removed by the store;
//! the expiry sweep finds them with `find_expired`.

use async_trait::async_trait;

use crate::domain::cooldown::{Cooldown, CooldownKind};
use crate::domain::foundation::{DomainError, SubjectId, Timestamp};

#[async_trait]
pub trait CooldownRepository: Send + Sync {
    async fn find(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
    ) -> Result<Option<Cooldown>, DomainError>;

    /// All records for one subject, any kind.
    async fn list_for_subject(&self, subject: &SubjectId) -> Result<Vec<Cooldown>, DomainError>;

    /// Records whose `expires_at` is at or before `now`, oldest first.
    async fn find_expired(&self, now: Timestamp) -> Result<Vec<Cooldown>, DomainError>;

    /// Insert or replace the record for (`cooldown.subject`, `cooldown.kind`).
    async fn upsert(&self, cooldown: &Cooldown) -> Result<(), DomainError>;

    /// Returns `true` if a record existed.
    async fn delete(&self, subject: &SubjectId, kind: &CooldownKind) -> Result<bool, DomainError>;

    /// Delete the record only if its `expires_at` still equals `expires_at`.
    ///
    /// Callers that decided to delete from an earlier read use this so a
    /// cooldown re-applied in the meantime survives. Returns `true` if a
    /// record was deleted.
    async fn delete_if_expires_at(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
        expires_at: Timestamp,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn CooldownRepository) {}
    }
}
