//! Ledger record types
//!
//! A `TransactionRecord` is one immutable line of an account's audit trail.
//! Records are appended by the settlement engine in the same atomic commit
//! as the balance change they describe, and are never edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, IdempotencyKey, OrderId, TransactionId};

/// Kinds of ledger movement
///
/// Top-ups and refunds credit the account, purchases debit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Simulated point grant
    #[serde(rename = "TOPUP")]
    TopUp,

    /// Points spent on an order
    Purchase,

    /// Points returned for a refunded order
    Refund,
}

impl TransactionType {
    /// Whether this movement increases the balance
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionType::TopUp | TransactionType::Refund)
    }

    /// Apply a movement of `amount` to `balance`
    ///
    /// Returns `None` when a credit would overflow or a debit would take the
    /// balance below zero.
    pub fn apply(self, balance: u64, amount: u64) -> Option<u64> {
        if self.is_credit() {
            balance.checked_add(amount)
        } else {
            balance.checked_sub(amount)
        }
    }

    /// Lower-case label used in logs and error messages
    pub fn label(self) -> &'static str {
        match self {
            TransactionType::TopUp => "top-up",
            TransactionType::Purchase => "purchase",
            TransactionType::Refund => "refund",
        }
    }
}

/// Settlement status of a record
///
/// The synchronous settlement path only ever writes `Completed`; `Pending`
/// is reserved for asynchronous settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Position of an account's ledger after a movement was posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPosition {
    /// Balance immediately after the movement
    pub balance_after: u64,

    /// Per-account sequence number assigned to the movement
    pub sequence: u64,
}

/// Immutable audit record of one balance movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub tx_type: TransactionType,

    /// Points moved, always positive
    pub amount: u64,

    /// Account balance right after this record, captured at commit time
    pub balance_after: u64,

    /// Position in the account's ledger; strictly increasing per account
    pub sequence: u64,

    pub status: TransactionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,

    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a completed record for a movement that has just been posted
    pub fn completed(
        account_id: AccountId,
        tx_type: TransactionType,
        amount: u64,
        position: LedgerPosition,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            tx_type,
            amount,
            balance_after: position.balance_after,
            sequence: position.sequence,
            status: TransactionStatus::Completed,
            payment_method: None,
            order_id: None,
            idempotency_key: None,
            description: description.into(),
            timestamp,
        }
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Signed contribution of this record to the account balance
    pub fn signed_amount(&self) -> i128 {
        if self.tx_type.is_credit() {
            i128::from(self.amount)
        } else {
            -i128::from(self.amount)
        }
    }
}
