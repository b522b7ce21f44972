//! Role operation execution: dedup, per-subject ordering, global
//! concurrency bound and retry.

mod limiter;
mod operation_executor;
mod retry;

pub use limiter::{
    clamp_concurrency, ConcurrencyLimiter, LimiterPermit, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
    MIN_CONCURRENCY,
};
pub use operation_executor::{ExecutorConfig, RoleOperationExecutor};
pub use retry::RetryPolicy;
