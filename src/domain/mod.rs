//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (ids, timestamps, errors)
//! - `org` - Organizations, memberships, affiliation rules
//! - `cooldown` - Time-bounded restrictions and their drift decision table
//! - `roles` - Role mutation requests and results
//! - `audit` - Structured audit events

pub mod audit;
pub mod cooldown;
pub mod foundation;
pub mod org;
pub mod roles;
