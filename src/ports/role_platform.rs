//! Directory platform port.
//!
//! The platform owns the authoritative external role assignments. Reads
//! (roster, member, role metadata) may come from anywhere; writes go only
//! through the role operation executor.
//!
//! Adapters normalize every failure into a [`PlatformError`] at the
//! boundary so that retry policy downstream only ever inspects
//! [`PlatformErrorKind`] and an optional wait hint.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::domain::foundation::{RoleId, SubjectId};
use crate::domain::roles::RoleAction;

/// One subject on the roster and the roles it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub subject: SubjectId,
    pub roles: HashSet<RoleId>,
}

impl RosterEntry {
    pub fn new(subject: SubjectId, roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            subject,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }
}

/// Metadata about a role needed for precondition checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub name: String,
    /// Higher positions outrank lower ones.
    pub position: i64,
}

/// Normalized failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorKind {
    PermissionDenied,
    RateLimited,
    Transient,
    Other,
}

impl PlatformErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformErrorKind::PermissionDenied => "permission_denied",
            PlatformErrorKind::RateLimited => "rate_limited",
            PlatformErrorKind::Transient => "transient",
            PlatformErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform failure with its normalized kind and optional wait hint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    /// Platform-provided wait before retrying, when it gave one.
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after: None,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::PermissionDenied, message)
    }

    pub fn rate_limited(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::RateLimited,
            retry_after,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Transient, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Other, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            PlatformErrorKind::RateLimited | PlatformErrorKind::Transient
        )
    }
}

/// Port for reading and mutating external role assignments.
#[async_trait]
pub trait RolePlatform: Send + Sync {
    /// Every subject currently on the roster with its role set.
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, PlatformError>;

    /// A single subject, or `None` if it is not on the roster.
    async fn fetch_member(&self, subject: &SubjectId) -> Result<Option<RosterEntry>, PlatformError>;

    /// Role metadata, or `None` if the role does not exist.
    async fn fetch_role(&self, role: &RoleId) -> Result<Option<RoleInfo>, PlatformError>;

    /// Position of the highest role held by this process's own account.
    async fn authority_position(&self) -> Result<i64, PlatformError>;

    /// Adds or removes one role. Not idempotent-checked; callers do that.
    async fn mutate_role(
        &self,
        subject: &SubjectId,
        role: &RoleId,
        action: RoleAction,
        reason: &str,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_platform_is_object_safe() {
        fn _accepts_dyn(_platform: &dyn RolePlatform) {}
    }

    #[test]
    fn only_rate_limited_and_transient_are_retryable() {
        assert!(PlatformError::rate_limited(None, "slow down").is_retryable());
        assert!(PlatformError::transient("502").is_retryable());
        assert!(!PlatformError::permission_denied("403").is_retryable());
        assert!(!PlatformError::other("400").is_retryable());
    }

    #[test]
    fn error_display_includes_kind() {
        let err = PlatformError::rate_limited(Some(Duration::from_secs(2)), "global limit");
        assert_eq!(err.to_string(), "rate_limited: global limit");
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));
    }

    #[test]
    fn roster_entry_checks_roles() {
        let entry = RosterEntry::new(
            SubjectId::new("1").unwrap(),
            vec![RoleId::new("a").unwrap()],
        );
        assert!(entry.has_role(&RoleId::new("a").unwrap()));
        assert!(!entry.has_role(&RoleId::new("b").unwrap()));
    }
}
