//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of attempts (`max_retries + 1`)
//! - Compute the wait before each retry
//!
//! # Design Decisions
//! - Only transport failures are retried; any HTTP status is a result
//! - Linear backoff, not exponential
//! - Request bodies are buffered by the caller so every attempt can replay them

use std::time::Duration;

use crate::resilience::backoff::linear_backoff;

/// Attempt bound and backoff for one forwarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_step: Duration) -> Self {
        Self {
            max_retries,
            backoff_step,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after failed attempt `attempt` (1-based), or `None` if it was the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            None
        } else {
            Some(linear_backoff(attempt, self.backoff_step))
        }
    }
}
