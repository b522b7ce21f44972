//! Role mutation requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{RoleId, SubjectId};

/// Direction of a role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    Add,
    Remove,
}

impl RoleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleAction::Add => "add",
            RoleAction::Remove => "remove",
        }
    }

    /// Whether a subject holding (or not holding) the role already satisfies
    /// this action.
    pub fn is_satisfied_by(&self, holds_role: bool) -> bool {
        match self {
            RoleAction::Add => holds_role,
            RoleAction::Remove => !holds_role,
        }
    }
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to add or remove one role on one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOperation {
    pub subject: SubjectId,
    pub role: RoleId,
    pub action: RoleAction,
    /// Free text forwarded to the platform's audit trail.
    pub reason: String,
}

impl RoleOperation {
    pub fn add(subject: SubjectId, role: RoleId, reason: impl Into<String>) -> Self {
        Self {
            subject,
            role,
            action: RoleAction::Add,
            reason: reason.into(),
        }
    }

    pub fn remove(subject: SubjectId, role: RoleId, reason: impl Into<String>) -> Self {
        Self {
            subject,
            role,
            action: RoleAction::Remove,
            reason: reason.into(),
        }
    }

    /// Identity used to collapse concurrent duplicates.
    pub fn dedup_key(&self) -> OperationKey {
        OperationKey {
            subject: self.subject.clone(),
            role: self.role.clone(),
            action: self.action,
        }
    }
}

impl fmt::Display for RoleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} role {} on {}", self.action, self.role, self.subject)
    }
}

/// (subject, role, action) triple; the reason does not participate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub subject: SubjectId,
    pub role: RoleId,
    pub action: RoleAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        SubjectId::new("5").unwrap()
    }

    fn role() -> RoleId {
        RoleId::new("r").unwrap()
    }

    #[test]
    fn dedup_key_ignores_reason() {
        let a = RoleOperation::add(subject(), role(), "first");
        let b = RoleOperation::add(subject(), role(), "second");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn dedup_key_distinguishes_action() {
        let a = RoleOperation::add(subject(), role(), "x");
        let b = RoleOperation::remove(subject(), role(), "x");
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn satisfaction_follows_action() {
        assert!(RoleAction::Add.is_satisfied_by(true));
        assert!(!RoleAction::Add.is_satisfied_by(false));
        assert!(RoleAction::Remove.is_satisfied_by(false));
        assert!(!RoleAction::Remove.is_satisfied_by(true));
    }

    #[test]
    fn display_describes_operation() {
        let op = RoleOperation::remove(subject(), role(), "expired");
        assert_eq!(op.to_string(), "remove role r on 5");
    }
}
