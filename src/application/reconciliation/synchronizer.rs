//! Membership Synchronizer.
//!
//! Derives a subject's canonical org membership from the base roles it
//! holds externally and writes the local record to match. External roles
//! are authoritative for membership in both reconciliation modes; the
//! synchronizer never mutates roles.
//!
//! A subject holding the base role of more than one org is a conflict: the
//! local record is left exactly as it is and a throttled diagnostic is
//! logged instead.

use std::collections::HashSet;
use std::sync::Arc;

use super::throttle::DiagnosticThrottle;
use crate::domain::foundation::{DomainError, OrgId, RoleId, SubjectId, Timestamp};
use crate::domain::org::{
    leadership_without_base, observe_membership, shared_leadership_roles, LastOrgState,
    Membership, MembershipObservation, Org, OrgRank, RemovedBy,
};
use crate::ports::{LastOrgStateRepository, MembershipRepository};

/// What the synchronizer did for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Joined {
        org_id: OrgId,
        rank: OrgRank,
    },
    /// Org or rank changed; previous values are kept for audit diffing.
    Updated {
        previous_org: OrgId,
        previous_rank: OrgRank,
        org_id: OrgId,
        rank: OrgRank,
    },
    Removed {
        previous_org: OrgId,
    },
    Conflict {
        org_ids: Vec<OrgId>,
    },
}

impl SyncOutcome {
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Joined { .. } | SyncOutcome::Updated { .. } | SyncOutcome::Removed { .. }
        )
    }

    /// One-line human-readable description of a change.
    pub fn describe(&self, subject: &SubjectId, orgs: &[Org]) -> Option<String> {
        let name = |id: &OrgId| org_name(orgs, id);
        match self {
            SyncOutcome::Unchanged | SyncOutcome::Conflict { .. } => None,
            SyncOutcome::Joined { org_id, rank } => Some(format!(
                "{}: joined {} as {}",
                subject,
                name(org_id),
                rank
            )),
            SyncOutcome::Updated {
                previous_org,
                previous_rank,
                org_id,
                rank,
            } => Some(format!(
                "{}: {} ({}) -> {} ({})",
                subject,
                name(previous_org),
                previous_rank,
                name(org_id),
                rank
            )),
            SyncOutcome::Removed { previous_org } => Some(format!(
                "{}: left {} (base role gone)",
                subject,
                name(previous_org)
            )),
        }
    }
}

fn org_name(orgs: &[Org], id: &OrgId) -> String {
    orgs.iter()
        .find(|org| &org.id == id)
        .map(|org| org.name.clone())
        .unwrap_or_else(|| id.to_string())
}

pub struct MembershipSynchronizer {
    memberships: Arc<dyn MembershipRepository>,
    last_org: Arc<dyn LastOrgStateRepository>,
    throttle: Arc<DiagnosticThrottle>,
}

impl MembershipSynchronizer {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        last_org: Arc<dyn LastOrgStateRepository>,
        throttle: Arc<DiagnosticThrottle>,
    ) -> Self {
        Self {
            memberships,
            last_org,
            throttle,
        }
    }

    /// Bring one subject's local membership in line with its external roles.
    pub async fn sync_subject(
        &self,
        subject: &SubjectId,
        roles: &HashSet<RoleId>,
        orgs: &[Org],
        now: Timestamp,
    ) -> Result<SyncOutcome, DomainError> {
        self.check_leadership_without_base(subject, roles, orgs);

        let current = self.memberships.find_by_subject(subject).await?;

        match observe_membership(roles, orgs) {
            MembershipObservation::Conflict { org_ids } => {
                if self.throttle.should_emit(&format!("conflict:{}", subject)) {
                    let names: Vec<String> = org_ids.iter().map(|id| org_name(orgs, id)).collect();
                    tracing::warn!(
                        subject = %subject,
                        orgs = %names.join(", "),
                        "subject holds base roles of multiple orgs; membership left untouched"
                    );
                }
                Ok(SyncOutcome::Conflict { org_ids })
            }

            MembershipObservation::Unaffiliated => {
                let Some(previous) = current else {
                    return Ok(SyncOutcome::Unchanged);
                };
                self.memberships.delete(subject).await?;
                let archived = LastOrgState::from_membership(&previous, now, RemovedBy::RoleSync);
                if let Err(e) = self.last_org.upsert(&archived).await {
                    tracing::warn!(subject = %subject, error = %e, "failed to archive last org");
                }
                Ok(SyncOutcome::Removed {
                    previous_org: previous.org_id,
                })
            }

            MembershipObservation::Member { org_id, rank } => match current {
                Some(existing) if existing.matches(org_id, rank) => Ok(SyncOutcome::Unchanged),
                Some(existing) => {
                    let moved = existing.moved_to(org_id, rank, now);
                    self.memberships.upsert(&moved).await?;
                    if existing.org_id != org_id {
                        let archived =
                            LastOrgState::from_membership(&existing, now, RemovedBy::RoleSync);
                        if let Err(e) = self.last_org.upsert(&archived).await {
                            tracing::warn!(subject = %subject, error = %e, "failed to archive last org");
                        }
                    }
                    Ok(SyncOutcome::Updated {
                        previous_org: existing.org_id,
                        previous_rank: existing.rank,
                        org_id,
                        rank,
                    })
                }
                None => {
                    let membership = Membership::new(subject.clone(), org_id, rank, now);
                    self.memberships.upsert(&membership).await?;
                    Ok(SyncOutcome::Joined { org_id, rank })
                }
            },
        }
    }

    /// Log leadership roles configured on more than one org.
    ///
    /// Read-only; called once per tick.
    pub fn check_shared_leadership(&self, orgs: &[Org]) {
        for (role, org_ids) in shared_leadership_roles(orgs) {
            if self.throttle.should_emit(&format!("shared-leadership:{}", role)) {
                let names: Vec<String> = org_ids.iter().map(|id| org_name(orgs, id)).collect();
                tracing::warn!(
                    role = %role,
                    orgs = %names.join(", "),
                    "leadership role is configured on multiple orgs"
                );
            }
        }
    }

    fn check_leadership_without_base(
        &self,
        subject: &SubjectId,
        roles: &HashSet<RoleId>,
        orgs: &[Org],
    ) {
        for org_id in leadership_without_base(roles, orgs) {
            if self
                .throttle
                .should_emit(&format!("leader-without-base:{}:{}", subject, org_id))
            {
                tracing::warn!(
                    subject = %subject,
                    org = %org_name(orgs, &org_id),
                    "subject holds a leadership role without the org's base role"
                );
            }
        }
    }
}
