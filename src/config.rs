//! Engine configuration
//!
//! Business constants of the settlement engine, with defaults matching the
//! production rules: top-ups between 100 and 50,000 points, at most one
//! top-up per account every 10 seconds, 1,000 points for a new account, and
//! five attempts per conflicting settlement.

use std::time::Duration;

use crate::core::RetryPolicy;
use crate::types::LedgerError;

/// Tunable limits of the settlement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Smallest permitted top-up (inclusive)
    pub top_up_min: u64,

    /// Largest permitted top-up (inclusive)
    pub top_up_max: u64,

    /// Minimum interval between committed top-ups of one account
    pub top_up_cooldown: Duration,

    /// Balance granted to newly opened accounts
    pub opening_balance: u64,

    /// Conflict retry policy for every transactional operation
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_up_min: 100,
            top_up_max: 50_000,
            top_up_cooldown: Duration::from_secs(10),
            opening_balance: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.top_up_cooldown = cooldown;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_opening_balance(mut self, opening_balance: u64) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    /// Check a top-up amount against the permitted range
    ///
    /// # Errors
    ///
    /// `Range` when the amount lies outside `[top_up_min, top_up_max]`.
    pub fn validate_top_up_amount(&self, amount: u64) -> Result<(), LedgerError> {
        if (self.top_up_min..=self.top_up_max).contains(&amount) {
            Ok(())
        } else {
            Err(LedgerError::range(amount, self.top_up_min, self.top_up_max))
        }
    }
}
