//! Bounded exponential backoff.

use std::time::Duration;

/// Delay before the retry that follows `attempt_count` failed attempts.
///
/// `min(base_delay_ms * 2^attempt_count, max_delay_ms)`, computed with
/// checked integer arithmetic: an overflowing shift or multiply saturates to
/// `max_delay_ms`.
pub fn next_delay(attempt_count: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    1u64.checked_shl(attempt_count)
        .and_then(|factor| base_delay_ms.checked_mul(factor))
        .map_or(max_delay_ms, |delay| delay.min(max_delay_ms))
}

/// Outcome of asking the policy whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Retry after `delay`.
    Retry { delay: Duration },
    /// Attempts exhausted; stop permanently.
    Exhausted,
}

/// Reconnection policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum consecutive reconnect attempts (0 disables reconnection).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 16000,
        }
    }
}

impl ReconnectPolicy {
    /// Decide what to do after a non-terminal close, given how many retries
    /// have already been scheduled since the last successful authentication.
    pub fn decide(&self, attempt_count: u32) -> ReconnectDecision {
        if attempt_count >= self.max_attempts {
            return ReconnectDecision::Exhausted;
        }
        ReconnectDecision::Retry {
            delay: Duration::from_millis(next_delay(
                attempt_count,
                self.base_delay_ms,
                self.max_delay_ms,
            )),
        }
    }
}
