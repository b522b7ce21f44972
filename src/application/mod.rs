//! Application layer - Executor, background services, and handlers.
//!
//! This layer orchestrates domain decisions and coordinates between ports.
//! The executor is the only path to role mutations; the watchdog, the
//! expiry sweeper, and the command handlers all share one instance.

pub mod executor;
pub mod handlers;
pub mod reconciliation;
pub mod scheduler;

pub use executor::{ExecutorConfig, RetryPolicy, RoleOperationExecutor};
pub use reconciliation::{Watchdog, WatchdogConfig};
pub use scheduler::{ExpirySweeper, ExpirySweeperConfig};
