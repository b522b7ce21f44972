//! Outcome of a role mutation as seen by callers of the executor.

use std::fmt;

/// Why a precondition check refused to mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreconditionFailure {
    RoleNotFound,
    /// The executor's own highest role is not above the target role.
    HierarchyBlocked,
    /// The subject is not on the roster, so a role cannot be added.
    SubjectNotFound,
}

impl PreconditionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreconditionFailure::RoleNotFound => "role_not_found",
            PreconditionFailure::HierarchyBlocked => "hierarchy_blocked",
            PreconditionFailure::SubjectNotFound => "subject_not_found",
        }
    }
}

/// Final classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    PermissionDenied,
    RateLimited,
    Transient,
    PreconditionFailed(PreconditionFailure),
    Unknown,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::PermissionDenied => "permission_denied",
            FailureCause::RateLimited => "rate_limited",
            FailureCause::Transient => "transient",
            FailureCause::PreconditionFailed(p) => p.as_str(),
            FailureCause::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result delivered to every caller of a (possibly deduplicated) operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub ok: bool,
    /// External state already matched; no mutation was sent.
    pub skipped: bool,
    /// This caller joined an identical operation already in flight.
    pub deduped: bool,
    pub reason: Option<String>,
    pub cause: Option<FailureCause>,
}

impl OperationResult {
    pub fn applied() -> Self {
        Self {
            ok: true,
            skipped: false,
            deduped: false,
            reason: None,
            cause: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            skipped: true,
            deduped: false,
            reason: Some(reason.into()),
            cause: None,
        }
    }

    pub fn failed(cause: FailureCause, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            skipped: false,
            deduped: false,
            reason: Some(reason.into()),
            cause: Some(cause),
        }
    }

    pub fn as_deduped(mut self) -> Self {
        self.deduped = true;
        self
    }

    /// Whether a mutation actually reached the platform on behalf of this result.
    pub fn mutated(&self) -> bool {
        self.ok && !self.skipped
    }

    /// Short human-readable failure description.
    pub fn describe_failure(&self) -> String {
        match (&self.cause, &self.reason) {
            (Some(cause), Some(reason)) => format!("{}: {}", cause, reason),
            (Some(cause), None) => cause.to_string(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "unknown failure".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_result_mutated() {
        let r = OperationResult::applied();
        assert!(r.ok && r.mutated());
        assert!(!r.deduped);
    }

    #[test]
    fn skipped_result_is_ok_but_not_mutated() {
        let r = OperationResult::skipped("already present");
        assert!(r.ok);
        assert!(!r.mutated());
        assert_eq!(r.reason.as_deref(), Some("already present"));
    }

    #[test]
    fn failed_result_describes_cause() {
        let r = OperationResult::failed(
            FailureCause::PreconditionFailed(PreconditionFailure::HierarchyBlocked),
            "role above bot",
        );
        assert!(!r.ok);
        assert_eq!(r.describe_failure(), "hierarchy_blocked: role above bot");
    }

    #[test]
    fn as_deduped_marks_flag_only() {
        let r = OperationResult::applied().as_deduped();
        assert!(r.deduped);
        assert!(r.mutated());
    }
}
