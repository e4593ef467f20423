//! Time sources for timer-driven state machines.
//!
//! Gesture progress and trade identifiers need "now" in milliseconds. Passing a
//! `Clock` instead of reading the system time directly keeps the state machines
//! deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Wall clock: milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Monotonic clock backed by `tokio::time::Instant`.
///
/// Milliseconds are measured from the moment the clock was created. Because it
/// reads tokio's clock, it follows `tokio::time::pause()` / `advance()` in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock whose zero is "now".
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
