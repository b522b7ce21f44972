//! Cooldown domain module.
//!
//! Time-bounded restrictions mirrored by external role flags, and the pure
//! rules that decide how to repair disagreement between the two.

mod decision;
mod record;

pub use decision::{decide_cooldown_action, CooldownAction, EnforcementMode};
pub use record::{Cooldown, CooldownKind, CooldownPolicy};
