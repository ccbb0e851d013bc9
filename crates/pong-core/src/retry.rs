//! Retry configuration and backoff calculation for connect attempts.
//!
//! The delay before retry `n` (zero-based) is `initial_delay * 2^n`, capped at
//! `max_delay`. No jitter: a single agent reconnecting to a single server
//! does not need de-synchronization.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default delay before the first retry in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default cap on the delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 8000;

/// Connect retry parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total number of attempts.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before retry `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            retry,
            self.initial_delay_ms,
            self.max_delay_ms,
        ))
    }
}

/// Exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}
