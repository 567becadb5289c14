//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `ids`: Opaque entity identifiers
//! - `account`: Accounts and balance posting
//! - `product`: Catalog products
//! - `order`: Orders, line items and the order status machine
//! - `transaction`: Immutable ledger records
//! - `idempotency`: Markers for resubmitted settlement requests
//! - `error`: Error types for the ledger

pub mod account;
pub mod error;
pub mod idempotency;
pub mod ids;
pub mod order;
pub mod product;
pub mod transaction;

pub use account::{Account, NewAccount, Role};
pub use error::{EntityKind, LedgerError, StoreError};
pub use idempotency::{IdempotencyMarker, IdempotentOutcome};
pub use ids::{AccountId, IdempotencyKey, OrderId, ProductId, TransactionId};
pub use order::{LineItem, LineItemRequest, Order, OrderStatus};
pub use product::{NewProduct, Product, ProductStatus, ProductUpdate};
pub use transaction::{LedgerPosition, TransactionRecord, TransactionStatus, TransactionType};
