//! Scheduled background services.

mod expiry_sweeper;

pub use expiry_sweeper::{
    ExpirySweeper, ExpirySweeperConfig, SweepReport, COOLDOWN_EXPIRED_TITLE,
    COOLDOWN_EXPIRY_FAILED_TITLE,
};
