//! Cooldown records and kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::foundation::{OrgId, RoleId, SubjectId, Timestamp, ValidationError};

/// Name of a restriction family, e.g. `org_leave` or `org_join`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CooldownKind(String);

impl CooldownKind {
    pub fn new(kind: impl Into<String>) -> Result<Self, ValidationError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(ValidationError::empty_field("cooldown_kind"));
        }
        Ok(Self(kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CooldownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A time-bounded restriction mirrored by an external role.
///
/// Expiry is not self-enforcing: once `expires_at` passes the record stays
/// until a sweep removes the role and deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    pub subject: SubjectId,
    pub kind: CooldownKind,
    pub expires_at: Timestamp,
    pub origin_org: Option<OrgId>,
    pub created_at: Timestamp,
}

impl Cooldown {
    pub fn new(
        subject: SubjectId,
        kind: CooldownKind,
        duration: Duration,
        origin_org: Option<OrgId>,
        now: Timestamp,
    ) -> Self {
        Self {
            subject,
            kind,
            expires_at: now.plus(duration),
            origin_org,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.expires_at.is_after(&now)
    }
}

/// Binds a cooldown kind to the external role that mirrors it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub kind: CooldownKind,
    pub role: RoleId,
    /// Used when a record has to be backfilled for an unexplained role.
    pub default_duration: Duration,
}

impl CooldownPolicy {
    pub fn new(kind: CooldownKind, role: RoleId, default_duration: Duration) -> Self {
        Self {
            kind,
            role,
            default_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind() -> CooldownKind {
        CooldownKind::new("org_leave").unwrap()
    }

    #[test]
    fn empty_kind_is_rejected() {
        assert!(CooldownKind::new(" ").is_err());
    }

    #[test]
    fn new_cooldown_expires_after_duration() {
        let now = Timestamp::now();
        let cd = Cooldown::new(
            SubjectId::new("1").unwrap(),
            kind(),
            Duration::from_secs(3600),
            None,
            now,
        );

        assert_eq!(cd.created_at, now);
        assert_eq!(cd.expires_at, now.plus_secs(3600));
        assert!(!cd.is_expired(now));
        assert!(cd.is_expired(now.plus_secs(3600)));
    }
}
