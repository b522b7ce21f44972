//! Per-key rate limiting for diagnostics that would otherwise repeat every tick.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_DIAGNOSTIC_WINDOW: Duration = Duration::from_secs(120);

/// Entries older than this many windows are pruned on insert.
const PRUNE_AFTER_WINDOWS: u32 = 4;

#[derive(Debug)]
pub struct DiagnosticThrottle {
    window: Duration,
    last_emitted: Mutex<HashMap<String, Instant>>,
}

impl Default for DiagnosticThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_WINDOW)
    }
}

impl DiagnosticThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` at most once per window for a given key.
    pub fn should_emit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut last = self.last_emitted.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(at) = last.get(key) {
            if now.duration_since(*at) < self.window {
                return false;
            }
        }

        let horizon = self.window.saturating_mul(PRUNE_AFTER_WINDOWS);
        last.retain(|_, at| now.duration_since(*at) < horizon);
        last.insert(key.to_string(), now);
        true
    }
}
