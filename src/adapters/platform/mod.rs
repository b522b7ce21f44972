//! Directory platform adapters.
//!
//! - `DiscordRolePlatform` - REST implementation
//! - `CachingRolePlatform` - roster cache decorator with write-through
//! - `InMemoryRolePlatform` - scriptable platform for tests

mod caching;
mod classify;
mod discord;
mod in_memory;

pub use caching::CachingRolePlatform;
pub use classify::{classify_response, classify_transport};
pub use discord::{DiscordConfig, DiscordRolePlatform};
pub use in_memory::{InMemoryRolePlatform, MutationRecord};
