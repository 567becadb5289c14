//! Core business logic module
//!
//! This module contains the settlement components:
//! - `traits` - Store and rate limiter abstractions
//! - `document` - Collections, keys and version tokens
//! - `ledger_store` - In-memory store with optimistic commits
//! - `ledger_transaction` - Guarded read-modify-write attempts
//! - `retry` - Bounded conflict retry with backoff
//! - `rate_limiter` - Per-account top-up cooldown
//! - `settlement` - Top-up, purchase and refund orchestration
//! - `administration` - Accounts, catalog, orders and queries
//! - `audit` - Ledger replay

pub mod administration;
pub mod audit;
pub mod document;
pub mod ledger_store;
pub mod ledger_transaction;
pub mod rate_limiter;
pub mod retry;
pub mod settlement;
pub mod traits;

pub use administration::{Administration, PurgeSummary};
pub use audit::{Divergence, LedgerAudit};
pub use document::{Collection, Document, DocumentKey, Entity, Version, Versioned};
pub use ledger_store::InMemoryLedgerStore;
pub use ledger_transaction::LedgerTransaction;
pub use rate_limiter::CooldownRateLimiter;
pub use retry::RetryPolicy;
pub use settlement::{PurchaseRequest, SettlementEngine, TopUpRequest};
pub use traits::{Commit, LedgerStore, RateLimiter, ReadGuard, WriteOp};
