//! Derives org affiliation from externally observed roles.
//!
//! Everything here is pure: callers supply a subject's role set and the org
//! definitions and decide what to do with the answer.

use std::collections::{BTreeMap, HashSet};

use super::{Org, OrgRank};
use crate::domain::foundation::{OrgId, RoleId};

/// What a subject's external roles say about its affiliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipObservation {
    /// Holds no active org's base role.
    Unaffiliated,
    /// Holds exactly one active org's base role.
    Member { org_id: OrgId, rank: OrgRank },
    /// Holds the base role of more than one active org.
    Conflict { org_ids: Vec<OrgId> },
}

/// Classifies a subject's affiliation from its external roles.
///
/// Inactive orgs are ignored.
pub fn observe_membership(roles: &HashSet<RoleId>, orgs: &[Org]) -> MembershipObservation {
    let hits: Vec<&Org> = orgs
        .iter()
        .filter(|org| org.active && roles.contains(&org.base_role))
        .collect();

    match hits.as_slice() {
        [] => MembershipObservation::Unaffiliated,
        [org] => MembershipObservation::Member {
            org_id: org.id,
            rank: rank_in(org, roles),
        },
        many => MembershipObservation::Conflict {
            org_ids: many.iter().map(|org| org.id).collect(),
        },
    }
}

/// Rank within a single org; leader outranks co-leader.
pub fn rank_in(org: &Org, roles: &HashSet<RoleId>) -> OrgRank {
    let holds = |role: &Option<RoleId>| role.as_ref().map_or(false, |r| roles.contains(r));
    if holds(&org.leader_role) {
        OrgRank::Leader
    } else if holds(&org.co_leader_role) {
        OrgRank::CoLeader
    } else {
        OrgRank::Member
    }
}

/// Leadership roles configured on more than one active org.
pub fn shared_leadership_roles(orgs: &[Org]) -> Vec<(RoleId, Vec<OrgId>)> {
    let mut owners: BTreeMap<&RoleId, Vec<OrgId>> = BTreeMap::new();
    for org in orgs.iter().filter(|org| org.active) {
        let mut seen = HashSet::new();
        for role in org.leadership_roles() {
            if seen.insert(role) {
                owners.entry(role).or_default().push(org.id);
            }
        }
    }
    owners
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(role, ids)| (role.clone(), ids))
        .collect()
}

/// Active orgs whose leadership role the subject holds without the base role.
pub fn leadership_without_base(roles: &HashSet<RoleId>, orgs: &[Org]) -> Vec<OrgId> {
    orgs.iter()
        .filter(|org| org.active && !roles.contains(&org.base_role))
        .filter(|org| org.leadership_roles().any(|r| roles.contains(r)))
        .map(|org| org.id)
        .collect()
}
