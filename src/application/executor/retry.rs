//! Retry policy for platform failures.
//!
//! | kind              | delay before next attempt                  |
//! |-------------------|--------------------------------------------|
//! | rate limited      | `max(wait hint, floor) + jitter`           |
//! | transient         | `base * attempt + jitter`                  |
//! | permission denied | no retry                                   |
//! | other             | no retry                                   |
//!
//! Attempts are capped at `max_attempts` (6 by default) in total.

use rand::Rng;
use std::time::Duration;

use crate::ports::{PlatformError, PlatformErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Minimum wait after a rate-limited response.
    pub rate_limit_floor: Duration,
    /// Per-attempt step for transient failures.
    pub transient_base: Duration,
    /// Upper bound of the uniformly random extra delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            rate_limit_floor: Duration::from_millis(1000),
            transient_base: Duration::from_millis(500),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_rate_limit_floor(mut self, floor: Duration) -> Self {
        self.rate_limit_floor = floor;
        self
    }

    pub fn with_transient_base(mut self, base: Duration) -> Self {
        self.transient_base = base;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before attempt `attempt + 1`, or `None` to stop retrying.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn delay_for(&self, error: &PlatformError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let base = match error.kind {
            PlatformErrorKind::RateLimited => error
                .retry_after
                .unwrap_or(Duration::ZERO)
                .max(self.rate_limit_floor),
            PlatformErrorKind::Transient => self.transient_base.saturating_mul(attempt),
            PlatformErrorKind::PermissionDenied | PlatformErrorKind::Other => return None,
        };
        Some(base.saturating_add(self.sample_jitter()))
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
