//! Membership handlers.
//!
//! ## Commands
//! - Removing a member on an administrator's request

mod remove_member;

pub use remove_member::{RemoveMemberCommand, RemoveMemberHandler, RemoveMemberResult};
