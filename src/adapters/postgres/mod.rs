//! PostgreSQL adapters - Database implementations for store ports.
//!
//! - `PostgresOrgRepository` - `orgs`
//! - `PostgresMembershipRepository` - `memberships`, keyed by subject
//! - `PostgresCooldownRepository` - `cooldowns`, keyed by (subject, kind)
//! - `PostgresLastOrgStateRepository` - `last_org_states`, keyed by subject
//! - `PostgresDepartureTracker` - reads `subject_departures`
//!
//! Schema is owned outside this crate; every upsert relies on the table's
//! primary key for `ON CONFLICT`.

mod cooldown_repository;
mod departure_tracker;
mod last_org_state_repository;
mod membership_repository;
mod org_repository;

pub use cooldown_repository::PostgresCooldownRepository;
pub use departure_tracker::PostgresDepartureTracker;
pub use last_org_state_repository::PostgresLastOrgStateRepository;
pub use membership_repository::PostgresMembershipRepository;
pub use org_repository::PostgresOrgRepository;

use crate::domain::foundation::{DomainError, ErrorCode, RoleId, SubjectId};

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

fn parse_subject(raw: String) -> Result<SubjectId, DomainError> {
    SubjectId::new(raw).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid subject_id: {}", e))
    })
}

fn parse_role(raw: String) -> Result<RoleId, DomainError> {
    RoleId::new(raw)
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid role id: {}", e)))
}
