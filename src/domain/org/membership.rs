//! Local membership records.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::OrgRank;
use crate::domain::foundation::{OrgId, SubjectId, Timestamp};

/// The authoritative local record of a subject's org affiliation.
///
/// Keyed by subject: a subject has at most one active membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub subject: SubjectId,
    pub org_id: OrgId,
    pub rank: OrgRank,
    pub since: Timestamp,
}

impl Membership {
    pub fn new(subject: SubjectId, org_id: OrgId, rank: OrgRank, since: Timestamp) -> Self {
        Self {
            subject,
            org_id,
            rank,
            since,
        }
    }

    /// Whether this record already describes the given affiliation.
    pub fn matches(&self, org_id: OrgId, rank: OrgRank) -> bool {
        self.org_id == org_id && self.rank == rank
    }

    /// Returns the record moved to a new affiliation.
    ///
    /// `since` is preserved for a rank change within the same org and reset
    /// when the org changes.
    pub fn moved_to(&self, org_id: OrgId, rank: OrgRank, now: Timestamp) -> Self {
        let since = if self.org_id == org_id { self.since } else { now };
        Self {
            subject: self.subject.clone(),
            org_id,
            rank,
            since,
        }
    }
}

/// Who ended a membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "actor", rename_all = "snake_case")]
pub enum RemovedBy {
    /// The base role disappeared externally.
    RoleSync,
    /// The subject left the roster and the retention window elapsed.
    StaleCleanup,
    /// An administrator removed the subject explicitly.
    Administrator(SubjectId),
}

impl RemovedBy {
    pub fn as_str(&self) -> &str {
        match self {
            RemovedBy::RoleSync => "role_sync",
            RemovedBy::StaleCleanup => "stale_cleanup",
            RemovedBy::Administrator(actor) => actor.as_str(),
        }
    }
}

impl fmt::Display for RemovedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovedBy::Administrator(actor) => write!(f, "administrator {}", actor),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Historical pointer to the last org a subject belonged to.
///
/// Never authoritative for current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOrgState {
    pub subject: SubjectId,
    pub last_org_id: OrgId,
    pub left_at: Timestamp,
    pub removed_by: RemovedBy,
}

impl LastOrgState {
    pub fn from_membership(membership: &Membership, left_at: Timestamp, removed_by: RemovedBy) -> Self {
        Self {
            subject: membership.subject.clone(),
            last_org_id: membership.org_id,
            left_at,
            removed_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        SubjectId::new("100").unwrap()
    }

    #[test]
    fn rank_change_in_same_org_keeps_since() {
        let org = OrgId::new();
        let then = Timestamp::now().minus_minutes(60);
        let m = Membership::new(subject(), org, OrgRank::Member, then);

        let moved = m.moved_to(org, OrgRank::Leader, Timestamp::now());
        assert_eq!(moved.since, then);
        assert_eq!(moved.rank, OrgRank::Leader);
    }

    #[test]
    fn org_change_resets_since() {
        let then = Timestamp::now().minus_minutes(60);
        let now = Timestamp::now();
        let m = Membership::new(subject(), OrgId::new(), OrgRank::Member, then);

        let other = OrgId::new();
        let moved = m.moved_to(other, OrgRank::Member, now);
        assert_eq!(moved.since, now);
        assert_eq!(moved.org_id, other);
    }

    #[test]
    fn matches_compares_org_and_rank() {
        let org = OrgId::new();
        let m = Membership::new(subject(), org, OrgRank::CoLeader, Timestamp::now());
        assert!(m.matches(org, OrgRank::CoLeader));
        assert!(!m.matches(org, OrgRank::Member));
        assert!(!m.matches(OrgId::new(), OrgRank::CoLeader));
    }

    #[test]
    fn last_org_state_copies_membership_pointer() {
        let m = Membership::new(subject(), OrgId::new(), OrgRank::Member, Timestamp::now());
        let left = Timestamp::now();
        let state = LastOrgState::from_membership(&m, left, RemovedBy::StaleCleanup);

        assert_eq!(state.last_org_id, m.org_id);
        assert_eq!(state.left_at, left);
        assert_eq!(state.removed_by.to_string(), "stale_cleanup");
    }
}
