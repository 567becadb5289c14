//! Settlement engine
//!
//! This module provides the `SettlementEngine`, which applies top-ups,
//! purchases and refunds as atomic multi-entity transactions against a
//! [`LedgerStore`].
//!
//! # Design
//!
//! Every operation is split into a synchronous *attempt* and the retry loop
//! around it. An attempt opens a [`LedgerTransaction`], reads everything it
//! needs from a fresh snapshot, validates the business rules against those
//! reads, buffers its writes and commits. A conflicting commit re-runs the
//! attempt from scratch; a business-rule failure ends the call with nothing
//! written.
//!
//! ```text
//! SettlementEngine
//!     ├── Arc<dyn LedgerStore>  (documents + optimistic commits)
//!     ├── Arc<dyn RateLimiter>  (top-up cooldown)
//!     └── EngineConfig          (limits + retry policy)
//! ```
//!
//! # Thread Safety
//!
//! The engine is cheap to clone and every clone shares the same store and
//! rate limiter. It holds no per-caller state: the account is a parameter of
//! every call.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::administration::Administration;
use super::ledger_store::InMemoryLedgerStore;
use super::ledger_transaction::LedgerTransaction;
use super::rate_limiter::CooldownRateLimiter;
use super::traits::{LedgerStore, RateLimiter};
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, IdempotencyKey, IdempotencyMarker, IdempotentOutcome, LedgerError,
    LineItem, LineItemRequest, Order, OrderId, OrderStatus, Product, TransactionRecord,
    TransactionType,
};

/// Request to grant points to an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUpRequest {
    pub account_id: AccountId,
    pub amount: u64,

    /// Payment method label recorded on the ledger entry
    pub method: String,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl TopUpRequest {
    pub fn new(account_id: impl Into<AccountId>, amount: u64, method: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
            method: method.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Request to spend points on products
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub account_id: AccountId,
    pub items: Vec<LineItemRequest>,

    /// Shipping destination, recorded on the order and the ledger entry
    pub destination: String,

    pub idempotency_key: Option<IdempotencyKey>,
}

impl PurchaseRequest {
    pub fn new(
        account_id: impl Into<AccountId>,
        items: Vec<LineItemRequest>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            items,
            destination: destination.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Outcome of one attempt
#[derive(Debug)]
enum Settled<T> {
    /// The attempt committed new state
    Committed(T),

    /// An earlier request with the same idempotency key already settled
    Replayed(T),
}

/// Executes top-ups, purchases and refunds atomically
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    config: EngineConfig,
}

impl SettlementEngine {
    /// Create an engine with a process-local cooldown limiter
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        let rate_limiter = Arc::new(CooldownRateLimiter::new(config.top_up_cooldown));
        Self::with_rate_limiter(store, rate_limiter, config)
    }

    /// Create an engine with a caller-supplied limiter (e.g. one shared across nodes)
    pub fn with_rate_limiter(
        store: Arc<dyn LedgerStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            rate_limiter,
            config,
        }
    }

    /// Create an engine over a fresh in-memory store
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), config)
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Administrative operations over the same store and limiter
    pub fn administration(&self) -> Administration {
        Administration::new(
            Arc::clone(&self.store),
            Arc::clone(&self.rate_limiter),
            self.config,
        )
    }

    /// Grant points to an account
    ///
    /// The amount and cooldown are checked before the store is touched. The
    /// cooldown window is only consumed once the top-up has committed.
    ///
    /// # Errors
    ///
    /// * `Range` - amount outside the configured bounds
    /// * `Throttled` - the account topped up within the cooldown
    /// * `NotFound` - unknown account
    /// * `ConflictExhausted` - every attempt conflicted
    #[tracing::instrument(name = "top_up", skip_all, fields(account = %request.account_id, amount = request.amount))]
    pub async fn top_up(&self, request: TopUpRequest) -> Result<TransactionRecord, LedgerError> {
        self.config.validate_top_up_amount(request.amount)?;

        if let Some(key) = &request.idempotency_key {
            let mut tx = LedgerTransaction::begin(self.store.as_ref());
            if let Some(outcome) = lookup_marker(&mut tx, &request.account_id, key)? {
                let record = replayed_top_up(&mut tx, key, outcome)?;
                debug!(record = %record.id, "top-up replayed from idempotency key");
                return Ok(record);
            }
        }

        let now = Utc::now();
        if !self.rate_limiter.check_and_peek(&request.account_id, now) {
            let retry_after = self
                .rate_limiter
                .retry_after(&request.account_id, now)
                .unwrap_or_default();
            return Err(LedgerError::throttled(request.account_id.clone(), retry_after));
        }

        let settled = self
            .config
            .retry
            .run("top_up", |_| self.attempt_top_up(&request))
            .await?;

        match settled {
            Settled::Committed(record) => {
                self.rate_limiter.commit(&request.account_id, Utc::now());
                info!(record = %record.id, balance_after = record.balance_after, "top-up settled");
                Ok(record)
            }
            Settled::Replayed(record) => {
                debug!(record = %record.id, "top-up replayed from idempotency key");
                Ok(record)
            }
        }
    }

    fn attempt_top_up(
        &self,
        request: &TopUpRequest,
    ) -> Result<Settled<TransactionRecord>, LedgerError> {
        let mut tx = LedgerTransaction::begin(self.store.as_ref());

        if let Some(key) = &request.idempotency_key {
            if let Some(outcome) = lookup_marker(&mut tx, &request.account_id, key)? {
                return replayed_top_up(&mut tx, key, outcome).map(Settled::Replayed);
            }
        }

        let mut account: Account = tx.require(request.account_id.as_str())?;
        let now = Utc::now();
        let position = account.post(TransactionType::TopUp, request.amount, now)?;

        let record = TransactionRecord::completed(
            account.id.clone(),
            TransactionType::TopUp,
            request.amount,
            position,
            format!("Top-up via {}", request.method),
            now,
        )
        .with_payment_method(request.method.clone())
        .with_idempotency_key(request.idempotency_key.clone());

        tx.put(account);
        tx.insert(record.clone());
        if let Some(key) = &request.idempotency_key {
            tx.insert(IdempotencyMarker::new(
                request.account_id.clone(),
                key.clone(),
                IdempotentOutcome::TopUp(record.id.clone()),
                now,
            ));
        }
        tx.commit()?;

        Ok(Settled::Committed(record))
    }

    /// Spend points on a set of products
    ///
    /// Prices and stock are read inside the committing attempt, so the order
    /// snapshots the prices that were current when it settled.
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - empty cart, zero quantity, or zero total
    /// * `NotFound` - unknown account
    /// * `InsufficientStock` - a product is missing, retired, or short
    /// * `InsufficientFunds` - the balance does not cover the total
    /// * `ConflictExhausted` - every attempt conflicted
    #[tracing::instrument(name = "purchase", skip_all, fields(account = %request.account_id, lines = request.items.len()))]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Order, LedgerError> {
        let items = normalize_line_items(&request.items)?;

        let settled = self
            .config
            .retry
            .run("purchase", |_| self.attempt_purchase(&request, &items))
            .await?;

        match settled {
            Settled::Committed(order) => {
                info!(order = %order.id, total = order.total_points, "purchase settled");
                Ok(order)
            }
            Settled::Replayed(order) => {
                debug!(order = %order.id, "purchase replayed from idempotency key");
                Ok(order)
            }
        }
    }

    fn attempt_purchase(
        &self,
        request: &PurchaseRequest,
        items: &[LineItemRequest],
    ) -> Result<Settled<Order>, LedgerError> {
        let mut tx = LedgerTransaction::begin(self.store.as_ref());

        if let Some(key) = &request.idempotency_key {
            if let Some(outcome) = lookup_marker(&mut tx, &request.account_id, key)? {
                return replayed_order(&mut tx, key, outcome).map(Settled::Replayed);
            }
        }

        let mut account: Account = tx.require(request.account_id.as_str())?;

        let mut products = Vec::with_capacity(items.len());
        for item in items {
            let product = tx
                .get::<Product>(item.product_id.as_str())?
                .filter(Product::is_active)
                .ok_or_else(|| {
                    LedgerError::insufficient_stock(item.product_id.clone(), 0, item.quantity)
                })?;
            products.push(product);
        }

        let lines: Vec<LineItem> = items
            .iter()
            .zip(&products)
            .map(|(item, product)| LineItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                price_at_purchase: product.price,
            })
            .collect();
        let total = order_total(&lines)?;

        if account.balance < total {
            return Err(LedgerError::insufficient_funds(
                account.id.clone(),
                account.balance,
                total,
            ));
        }

        let now = Utc::now();
        for (item, product) in items.iter().zip(products.iter_mut()) {
            product.take_stock(item.quantity, now)?;
        }

        let order_id = OrderId::generate();
        let position = account.post(TransactionType::Purchase, total, now)?;
        let order = Order::pending(
            order_id.clone(),
            account.id.clone(),
            lines,
            total,
            request.destination.clone(),
            now,
        );
        let record = TransactionRecord::completed(
            account.id.clone(),
            TransactionType::Purchase,
            total,
            position,
            format!("Checkout order {} | Dest: {}", order_id, request.destination),
            now,
        )
        .with_order(order_id.clone())
        .with_idempotency_key(request.idempotency_key.clone());

        tx.put(account);
        for product in products {
            tx.put(product);
        }
        tx.insert(order.clone());
        tx.insert(record);
        if let Some(key) = &request.idempotency_key {
            tx.insert(IdempotencyMarker::new(
                request.account_id.clone(),
                key.clone(),
                IdempotentOutcome::Purchase(order_id),
                now,
            ));
        }
        tx.commit()?;

        Ok(Settled::Committed(order))
    }

    /// Reverse a purchase: credit its total and restore its stock
    ///
    /// Only orders that have not shipped can be refunded; the order ends up
    /// `CANCELLED` and flagged as refunded. Cancelling an order through the
    /// status machine never refunds on its own.
    ///
    /// # Errors
    ///
    /// * `NotFound` - unknown order, or its account/products are gone
    /// * `AlreadyRefunded` - the order was refunded before
    /// * `InvalidTransition` - the order has shipped or been delivered
    /// * `ConflictExhausted` - every attempt conflicted
    #[tracing::instrument(name = "refund", skip_all, fields(order = %order_id))]
    pub async fn refund(&self, order_id: &OrderId) -> Result<TransactionRecord, LedgerError> {
        let record = self
            .config
            .retry
            .run("refund", |_| self.attempt_refund(order_id))
            .await?;
        info!(record = %record.id, balance_after = record.balance_after, "refund settled");
        Ok(record)
    }

    fn attempt_refund(&self, order_id: &OrderId) -> Result<TransactionRecord, LedgerError> {
        let mut tx = LedgerTransaction::begin(self.store.as_ref());

        let mut order: Order = tx.require(order_id.as_str())?;
        if order.refunded {
            return Err(LedgerError::AlreadyRefunded {
                order: order.id.clone(),
            });
        }
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Cancelled) {
            return Err(LedgerError::invalid_transition(
                order.id.clone(),
                order.status,
                OrderStatus::Cancelled,
            ));
        }

        let mut account: Account = tx.require(order.account_id.as_str())?;
        let now = Utc::now();
        for item in &order.items {
            let mut product: Product = tx.require(item.product_id.as_str())?;
            product.restock(item.quantity, now)?;
            tx.put(product);
        }

        let position = account.post(TransactionType::Refund, order.total_points, now)?;
        let record = TransactionRecord::completed(
            account.id.clone(),
            TransactionType::Refund,
            order.total_points,
            position,
            format!("Refund for order {}", order.id),
            now,
        )
        .with_order(order.id.clone());

        order.status = OrderStatus::Cancelled;
        order.refunded = true;
        order.updated_at = now;

        tx.put(account);
        tx.put(order);
        tx.insert(record.clone());
        tx.commit()?;

        Ok(record)
    }
}

/// Validate a cart and merge repeated products into one line
///
/// Merged lines keep the position of the product's first occurrence.
fn normalize_line_items(items: &[LineItemRequest]) -> Result<Vec<LineItemRequest>, LedgerError> {
    if items.is_empty() {
        return Err(LedgerError::invalid_request(
            "purchase requires at least one line item",
        ));
    }

    let mut merged: Vec<LineItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(LedgerError::invalid_request(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        match merged
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("line item quantity"))?;
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

fn order_total(lines: &[LineItem]) -> Result<u64, LedgerError> {
    let total = lines
        .iter()
        .try_fold(0u64, |sum, line| line.subtotal().and_then(|s| sum.checked_add(s)))
        .ok_or_else(|| LedgerError::arithmetic_overflow("order total"))?;
    if total == 0 {
        return Err(LedgerError::invalid_request("order total must be positive"));
    }
    Ok(total)
}

fn lookup_marker(
    tx: &mut LedgerTransaction<'_>,
    account_id: &AccountId,
    key: &IdempotencyKey,
) -> Result<Option<IdempotentOutcome>, LedgerError> {
    let marker = tx.get::<IdempotencyMarker>(&IdempotencyMarker::scoped_id(account_id, key))?;
    Ok(marker.map(|marker| marker.outcome))
}

fn key_reused(key: &IdempotencyKey) -> LedgerError {
    LedgerError::invalid_request(format!(
        "idempotency key {} already settled a different operation",
        key
    ))
}

fn replayed_top_up(
    tx: &mut LedgerTransaction<'_>,
    key: &IdempotencyKey,
    outcome: IdempotentOutcome,
) -> Result<TransactionRecord, LedgerError> {
    match outcome {
        IdempotentOutcome::TopUp(record_id) => tx.require(record_id.as_str()),
        IdempotentOutcome::Purchase(_) => Err(key_reused(key)),
    }
}

fn replayed_order(
    tx: &mut LedgerTransaction<'_>,
    key: &IdempotencyKey,
    outcome: IdempotentOutcome,
) -> Result<Order, LedgerError> {
    match outcome {
        IdempotentOutcome::Purchase(order_id) => tx.require(order_id.as_str()),
        IdempotentOutcome::TopUp(_) => Err(key_reused(key)),
    }
}
