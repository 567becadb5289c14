//! Idempotency markers
//!
//! A marker records that a caller-supplied key has already produced a
//! settlement, so a resubmitted request can be answered with the original
//! result instead of being applied twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, IdempotencyKey, OrderId, TransactionId};

/// What a key settled into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum IdempotentOutcome {
    /// A top-up and its ledger record
    TopUp(TransactionId),

    /// A purchase and its order
    Purchase(OrderId),
}

/// Stored marker for one `(account, key)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyMarker {
    pub account_id: AccountId,
    pub key: IdempotencyKey,
    pub outcome: IdempotentOutcome,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyMarker {
    pub fn new(
        account_id: AccountId,
        key: IdempotencyKey,
        outcome: IdempotentOutcome,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id,
            key,
            outcome,
            created_at,
        }
    }

    /// Storage id; keys are scoped per account
    pub fn scoped_id(account_id: &AccountId, key: &IdempotencyKey) -> String {
        format!("{}/{}", account_id, key)
    }
}
