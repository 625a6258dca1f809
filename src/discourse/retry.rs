//! Exponential backoff schedule for page fetches.

use std::time::Duration;

use crate::config::{Config, DEFAULT_FETCH_MAX_ATTEMPTS};

/// How many times to try a fetch and how long to wait in between.
///
/// After the n-th failed attempt the fetcher waits `unit * 2^n` before the
/// next one. With the default one-second unit that is 2s, 4s, 8s, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.fetch_max_attempts,
            unit: config.fetch_backoff_unit,
        }
    }

    /// Delay to wait after `failed_attempts` consecutive failures, or `None`
    /// when the budget is spent and no further attempt should be made.
    #[must_use]
    pub fn delay_after(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(failed_attempts).unwrap_or(u32::MAX);
        Some(self.unit.saturating_mul(factor))
    }
}
