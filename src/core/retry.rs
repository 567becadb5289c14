//! Bounded conflict retry
//!
//! Settlement attempts are pure functions of a fresh store snapshot. When an
//! attempt's commit is rejected because something it read changed, the whole
//! attempt runs again after a jittered exponential backoff. Business-rule
//! failures are returned immediately.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::types::LedgerError;

/// How often and how patiently to retry conflicting attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff before the second attempt
    pub base_delay: Duration,

    /// Upper bound of any single backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Create a policy; zero attempts are bumped to one
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Backoff after failed attempt number `attempt` (1-based)
    ///
    /// Exponential in the attempt number, capped at `max_delay`, with the
    /// actual sleep drawn uniformly from the upper half of that window.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        let ceiling_us = u64::try_from(ceiling.as_micros()).unwrap_or(u64::MAX);
        if ceiling_us == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::thread_rng().gen_range(ceiling_us / 2..=ceiling_us);
        Duration::from_micros(jittered)
    }

    /// Run `attempt` until it succeeds, fails terminally, or attempts run out
    ///
    /// The closure receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// The first non-retryable error, or `ConflictExhausted` once
    /// `max_attempts` retryable failures have occurred.
    pub async fn run<T, F>(&self, operation: &str, mut attempt: F) -> Result<T, LedgerError>
    where
        F: FnMut(u32) -> Result<T, LedgerError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut number = 1;
        loop {
            match attempt(number) {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => {
                    if number >= max_attempts {
                        warn!(operation, attempts = number, %error, "retries exhausted");
                        return Err(LedgerError::conflict_exhausted(operation, number));
                    }
                    let delay = self.backoff(number);
                    debug!(operation, attempt = number, ?delay, %error, "attempt conflicted, retrying");
                    tokio::time::sleep(delay).await;
                    number += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
