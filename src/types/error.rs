//! Error types for the points ledger
//!
//! # Error Categories
//!
//! - **Business rule errors**: amount out of range, throttled, insufficient
//!   funds or stock, invalid request, invalid status transition. These are
//!   terminal for the call and are surfaced verbatim to the caller.
//! - **Concurrency errors**: optimistic commit conflicts. These are retried
//!   inside the engine and only reach the caller as `ConflictExhausted`.
//! - **Store errors**: failures reported by the ledger store itself.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::ids::{AccountId, OrderId, ProductId};
use super::order::OrderStatus;

/// Entity kinds, used to name what was missing or duplicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Product,
    Order,
    Transaction,
    IdempotencyKey,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Account => "Account",
            EntityKind::Product => "Product",
            EntityKind::Order => "Order",
            EntityKind::Transaction => "Transaction",
            EntityKind::IdempotencyKey => "Idempotency key",
        };
        f.write_str(label)
    }
}

/// Errors reported by a ledger store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A document in the read set changed between read and commit
    #[error("Commit conflict on {collection}/{id}")]
    Conflict {
        /// Collection of the stale document
        collection: String,
        /// Id of the stale document
        id: String,
    },

    /// An attempt to overwrite an append-only ledger record
    #[error("Ledger record {id} is immutable")]
    ImmutableRecord {
        /// Id of the record
        id: String,
    },

    /// A stored document did not decode to the expected entity
    #[error("Document {collection}/{id} is corrupt")]
    Corrupt {
        /// Collection of the document
        collection: String,
        /// Id of the document
        id: String,
    },

    /// The store's internal state is unusable; no retry can succeed
    #[error("Ledger store poisoned: {message}")]
    Poisoned {
        /// Description of the failure
        message: String,
    },
}

impl StoreError {
    /// Whether a fresh attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Main error type for ledger operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Top-up amount outside the permitted range
    #[error("Top-up amount {amount} is outside the permitted range ({min} - {max} points)")]
    Range {
        /// Requested amount
        amount: u64,
        /// Inclusive lower bound
        min: u64,
        /// Inclusive upper bound
        max: u64,
    },

    /// A top-up was requested before the account's cooldown elapsed
    #[error("Top-up for account {account} throttled, retry in {retry_after_ms} ms")]
    Throttled {
        /// Account that was throttled
        account: AccountId,
        /// Remaining cooldown in milliseconds
        retry_after_ms: u64,
    },

    /// Account, product or order missing
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity
        entity: EntityKind,
        /// Requested id
        id: String,
    },

    /// An entity with that id already exists
    #[error("{entity} {id} already exists")]
    AlreadyExists {
        /// Kind of entity
        entity: EntityKind,
        /// Duplicate id
        id: String,
    },

    /// The account balance does not cover the purchase
    #[error("Insufficient funds for account {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Account id
        account: AccountId,
        /// Balance at the time of the check
        balance: u64,
        /// Points required
        required: u64,
    },

    /// A product is missing, retired, or short of stock
    #[error("Insufficient stock for product {product}: available {available}, requested {requested}")]
    InsufficientStock {
        /// The offending product
        product: ProductId,
        /// Units available (zero when the product is unavailable)
        available: u32,
        /// Units requested
        requested: u32,
    },

    /// Malformed request (empty cart, zero quantity, non-positive total)
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong
        reason: String,
    },

    /// The order status machine does not allow the transition
    #[error("Order {order} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Order id
        order: OrderId,
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// The order has already been refunded
    #[error("Order {order} has already been refunded")]
    AlreadyRefunded {
        /// Order id
        order: OrderId,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
    },

    /// Every attempt of an operation hit a concurrent modification
    #[error("{operation} abandoned after {attempts} conflicting attempts, please try again")]
    ConflictExhausted {
        /// Operation name
        operation: String,
        /// Attempts made
        attempts: u32,
    },

    /// Failure reported by the ledger store
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Whether the engine should retry the transactional body
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_transient())
    }

    /// Business rule violations, surfaced verbatim to the caller
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            LedgerError::Range { .. }
                | LedgerError::Throttled { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InsufficientStock { .. }
                | LedgerError::InvalidRequest { .. }
                | LedgerError::InvalidTransition { .. }
                | LedgerError::AlreadyRefunded { .. }
        )
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn range(amount: u64, min: u64, max: u64) -> Self {
        LedgerError::Range { amount, min, max }
    }

    pub fn throttled(account: AccountId, retry_after: Duration) -> Self {
        LedgerError::Throttled {
            account,
            retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: EntityKind, id: impl fmt::Display) -> Self {
        LedgerError::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_funds(account: AccountId, balance: u64, required: u64) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            required,
        }
    }

    pub fn insufficient_stock(product: ProductId, available: u32, requested: u32) -> Self {
        LedgerError::InsufficientStock {
            product,
            available,
            requested,
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        LedgerError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(order: OrderId, from: OrderStatus, to: OrderStatus) -> Self {
        LedgerError::InvalidTransition { order, from, to }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn conflict_exhausted(operation: &str, attempts: u32) -> Self {
        LedgerError::ConflictExhausted {
            operation: operation.to_string(),
            attempts,
        }
    }
}
