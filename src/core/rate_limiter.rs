//! Process-local top-up cooldown
//!
//! `CooldownRateLimiter` remembers when each account last completed a
//! top-up. It is sufficient for a single-node deployment; multi-node
//! deployments need a [`RateLimiter`] backed by shared storage so that
//! requests routed to different nodes cannot bypass the cooldown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::traits::RateLimiter;
use crate::types::AccountId;

/// Per-account minimum interval between committed top-ups
#[derive(Debug)]
pub struct CooldownRateLimiter {
    cooldown: Duration,

    /// Completion time of each account's last committed top-up
    last_top_up: DashMap<AccountId, DateTime<Utc>>,
}

impl CooldownRateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_top_up: DashMap::new(),
        }
    }

    fn elapsed_since_last(&self, account: &AccountId, now: DateTime<Utc>) -> Option<Duration> {
        self.last_top_up.get(account).map(|last| {
            // A clock stepping backwards counts as no time elapsed
            now.signed_duration_since(*last)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}

impl RateLimiter for CooldownRateLimiter {
    fn check_and_peek(&self, account: &AccountId, now: DateTime<Utc>) -> bool {
        self.retry_after(account, now).is_none()
    }

    fn retry_after(&self, account: &AccountId, now: DateTime<Utc>) -> Option<Duration> {
        let elapsed = self.elapsed_since_last(account, now)?;
        if elapsed >= self.cooldown {
            None
        } else {
            Some(self.cooldown - elapsed)
        }
    }

    fn commit(&self, account: &AccountId, now: DateTime<Utc>) {
        // Entries past their cooldown no longer throttle anything
        self.last_top_up.retain(|_, last| {
            now.signed_duration_since(*last)
                .to_std()
                .map_or(true, |elapsed| elapsed < self.cooldown)
        });
        self.last_top_up.insert(account.clone(), now);
    }

    fn forget(&self, account: &AccountId) {
        self.last_top_up.remove(account);
    }
}
