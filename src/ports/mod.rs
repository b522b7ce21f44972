//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the reconciliation core and the outside world. Adapters implement these
//! ports.
//!
//! ## Platform Port
//!
//! - `RolePlatform` - Roster reads and role mutations on the directory platform
//!
//! ## Store Ports
//!
//! - `OrgRepository` - Org definitions
//! - `MembershipRepository` - Subject -> org membership
//! - `CooldownRepository` - (subject, kind) -> restriction record
//! - `LastOrgStateRepository` - Historical last-org pointer
//!
//! ## Collaborator Ports
//!
//! - `AuditSink` - Best-effort structured audit delivery
//! - `DepartureTracker` - Last observed departure per subject

mod audit_sink;
mod cooldown_repository;
mod departure_tracker;
mod last_org_state_repository;
mod membership_repository;
mod org_repository;
mod role_platform;

pub use audit_sink::{push_best_effort, AuditSink};
pub use cooldown_repository::CooldownRepository;
pub use departure_tracker::DepartureTracker;
pub use last_org_state_repository::LastOrgStateRepository;
pub use membership_repository::MembershipRepository;
pub use org_repository::OrgRepository;
pub use role_platform::{
    PlatformError, PlatformErrorKind, RoleInfo, RolePlatform, RosterEntry,
};
