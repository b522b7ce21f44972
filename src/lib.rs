//! Role Warden - Membership and cooldown reconciliation service
//!
//! Keeps organization memberships and cooldown restrictions stored locally
//! converged with the role assignments a directory platform holds, under
//! the platform's rate limits and permission rules.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
