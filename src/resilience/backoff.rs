//! Backoff between startup attempts.

use std::time::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the delay grows between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Doubling delay with up to 10% jitter, capped at `max_ms`.
    Exponential,
}

/// Delay to wait after `attempt` (1-based) before starting the next one.
pub fn calculate_backoff(policy: BackoffPolicy, attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 || base_ms == 0 {
        return Duration::ZERO;
    }

    match policy {
        BackoffPolicy::Fixed => Duration::from_millis(base_ms),
        BackoffPolicy::Exponential => {
            let exponential_base = 2u64.saturating_pow(attempt - 1);
            let delay_ms = base_ms.saturating_mul(exponential_base);
            let capped_delay = delay_ms.min(max_ms);

            // Apply jitter (0 to 10% of the delay)
            let jitter_range = capped_delay / 10;
            let jitter = if jitter_range > 0 {
                rand::thread_rng().gen_range(0..jitter_range)
            } else {
                0
            };

            Duration::from_millis(capped_delay + jitter)
        }
    }
}
