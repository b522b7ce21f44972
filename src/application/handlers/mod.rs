//! Application handlers.
//!
//! Command handlers that touch roles and the store outside the background
//! loops. Every role mutation still goes through the shared executor.

pub mod cooldown;
pub mod membership;

pub use cooldown::{
    ApplyCooldownCommand, ApplyCooldownHandler, ApplyCooldownResult, ClearCooldownCommand,
    ClearCooldownHandler, ClearCooldownResult,
};
pub use membership::{RemoveMemberCommand, RemoveMemberHandler, RemoveMemberResult};
