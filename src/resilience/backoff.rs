//! Linear backoff.

use std::time::Duration;

/// Delay before retry number `retry` (1-based): `retry * step`.
pub fn linear_backoff(retry: u32, step: Duration) -> Duration {
    step.saturating_mul(retry)
}
