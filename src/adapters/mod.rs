//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the reconciliation core to external systems:
//! - `platform` - Directory platform (Discord REST, roster cache, in-memory)
//! - `postgres` - Persistent store and departure tracker
//! - `memory` - In-memory store and departure tracker for tests
//! - `audit` - Audit sinks (webhook, tracing, recording)

pub mod audit;
pub mod memory;
pub mod platform;
pub mod postgres;

pub use audit::{RecordingAuditSink, TracingAuditSink, WebhookAuditSink};
pub use memory::{InMemoryDepartureTracker, InMemoryStore};
pub use platform::{
    CachingRolePlatform, DiscordConfig, DiscordRolePlatform, InMemoryRolePlatform,
};
pub use postgres::{
    PostgresCooldownRepository, PostgresDepartureTracker, PostgresLastOrgStateRepository,
    PostgresMembershipRepository, PostgresOrgRepository,
};
