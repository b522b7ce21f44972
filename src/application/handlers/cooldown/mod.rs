//! Cooldown handlers.
//!
//! ## Commands
//! - Applying a cooldown (record, then role)
//! - Clearing a cooldown (role, then record)

mod apply_cooldown;
mod clear_cooldown;

pub use apply_cooldown::{ApplyCooldownCommand, ApplyCooldownHandler, ApplyCooldownResult};
pub use clear_cooldown::{ClearCooldownCommand, ClearCooldownHandler, ClearCooldownResult};
