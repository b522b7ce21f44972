//! Org domain module.
//!
//! Organizations, the local membership record, and the rules that derive
//! affiliation from external role assignments.
//!
//! # Module Structure
//!
//! - `definition` - Org, OrgKind, OrgRank
//! - `membership` - Membership and LastOrgState records
//! - `observation` - Pure classification of a subject's external roles

mod definition;
mod membership;
mod observation;

pub use definition::{Org, OrgKind, OrgRank};
pub use membership::{LastOrgState, Membership, RemovedBy};
pub use observation::{
    leadership_without_base, observe_membership, rank_in, shared_leadership_roles,
    MembershipObservation,
};
