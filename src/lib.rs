//! Points Ledger Library
//! # Overview
//!
//! This library provides a points ledger with an atomic settlement engine:
//! accounts hold points, earn them through top-ups, and spend them on catalog
//! products. Every settlement commits its balance change, stock changes,
//! order and ledger record together or not at all.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Product, Order, TransactionRecord, errors)
//! - [`config`] - Engine limits and retry policy
//! - [`core`] - Business logic components:
//!   - [`core::ledger_store`] - Document store with optimistic concurrency
//!   - [`core::settlement`] - Top-up, purchase and refund orchestration
//!   - [`core::administration`] - Accounts, catalog, order fulfilment, exports
//!   - [`core::rate_limiter`] - Per-account top-up cooldown
//! - [`io`] - CSV scenario parsing, state output and JSON export
//! - [`strategy`] - Sequential and concurrent scenario replay
//! - [`cli`] - CLI arguments parsing
//!
//! # Settlement Operations
//!
//! - **TopUp**: Grant points, bounded per request and throttled per account
//! - **Purchase**: Spend points on products, snapshotting their prices
//! - **Refund**: Return an unshipped order's points and stock
//!
//! # Invariants
//!
//! - A balance never goes below zero and stock never goes negative
//! - Every balance change has exactly one ledger record, written in the same commit
//! - Replaying an account's records from its opening balance reproduces its balance

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use crate::core::{
    Administration, InMemoryLedgerStore, LedgerStore, PurchaseRequest, RateLimiter, RetryPolicy,
    SettlementEngine, TopUpRequest,
};
pub use io::{write_export_json, write_state_csv};
pub use types::{
    Account, AccountId, LedgerError, LineItemRequest, Order, OrderId, OrderStatus, Product,
    ProductId, TransactionRecord, TransactionType,
};
