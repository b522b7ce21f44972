//! Global concurrency bound for external role mutations.
//!
//! Unlike a fixed semaphore the limit can move at runtime: raising it wakes
//! queued waiters immediately, lowering it only stops new admissions until
//! enough in-flight operations finish.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Clamp a requested concurrency into `[MIN_CONCURRENCY, MAX_CONCURRENCY]`.
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

#[derive(Debug)]
struct LimiterState {
    limit: usize,
    in_flight: usize,
}

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    state: Mutex<LimiterState>,
    released: Notify,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                limit: clamp_concurrency(limit),
                in_flight: 0,
            }),
            released: Notify::new(),
        }
    }

    /// Wait for a slot. The slot is returned when the permit drops.
    pub async fn acquire(self: &Arc<Self>) -> LimiterPermit {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await is not lost.
            notified.as_mut().enable();

            if self.try_take() {
                return LimiterPermit {
                    limiter: Arc::clone(self),
                };
            }
            notified.await;
        }
    }

    /// Change the limit; returns the clamped value actually applied.
    pub fn set_limit(&self, requested: usize) -> usize {
        let limit = clamp_concurrency(requested);
        self.lock().limit = limit;
        self.released.notify_waiters();
        limit
    }

    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn try_take(&self) -> bool {
        let mut state = self.lock();
        if state.in_flight < state.limit {
            state.in_flight += 1;
            true
        } else {
            false
        }
    }

    fn release(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.released.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds one concurrency slot until dropped.
#[derive(Debug)]
pub struct LimiterPermit {
    limiter: Arc<ConcurrencyLimiter>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn clamp_bounds_requested_values() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(3), 3);
        assert_eq!(clamp_concurrency(50), 10);
    }

    #[test]
    fn new_limiter_clamps_limit() {
        assert_eq!(ConcurrencyLimiter::new(0).limit(), 1);
        assert_eq!(ConcurrencyLimiter::new(99).limit(), 10);
    }

    #[tokio::test]
    async fn acquire_blocks_at_limit_and_resumes_on_release() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1));
        let first = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 1);

        let blocked = timeout(Duration::from_millis(30), limiter.acquire()).await;
        assert!(blocked.is_err());

        drop(first);
        let second = timeout(Duration::from_millis(200), limiter.acquire()).await;
        assert!(second.is_ok());
        assert_eq!(limiter.in_flight(), 1);
    }

    #[tokio::test]
    async fn raising_limit_admits_waiters_immediately() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1));
        let _held = limiter.acquire().await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert_eq!(limiter.set_limit(2), 2);
        let permit = timeout(Duration::from_millis(200), waiter).await;
        assert!(permit.is_ok());
        assert_eq!(limiter.in_flight(), 2);
    }

    #[tokio::test]
    async fn lowering_limit_does_not_preempt_in_flight() {
        let limiter = Arc::new(ConcurrencyLimiter::new(3));
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;

        limiter.set_limit(1);
        assert_eq!(limiter.in_flight(), 2);

        drop(a);
        // Still one in flight, which already meets the new limit.
        let blocked = timeout(Duration::from_millis(30), limiter.acquire()).await;
        assert!(blocked.is_err());

        drop(b);
        let admitted = timeout(Duration::from_millis(200), limiter.acquire()).await;
        assert!(admitted.is_ok());
    }
}
