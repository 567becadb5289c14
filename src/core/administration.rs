//! Administrative operations and read-side queries
//!
//! Account lifecycle, catalog management and order fulfilment, plus the
//! queries behind account statements and exports. Every mutation runs as a
//! guarded attempt under the engine's retry policy, exactly like a
//! settlement.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::audit::{self, LedgerAudit};
use super::document::{Collection, Document, Entity};
use super::ledger_transaction::LedgerTransaction;
use super::traits::{LedgerStore, RateLimiter};
use crate::config::EngineConfig;
use crate::io::export::AccountExport;
use crate::types::{
    Account, AccountId, EntityKind, IdempotencyMarker, LedgerError, NewAccount, NewProduct,
    Order, OrderId, OrderStatus, Product, ProductId, ProductStatus, ProductUpdate, Role,
    StoreError, TransactionRecord,
};

/// What a purge removed alongside the account itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub orders: usize,
    pub transactions: usize,
    pub idempotency_keys: usize,
}

/// Administrative handle over a ledger store
#[derive(Debug, Clone)]
pub struct Administration {
    store: Arc<dyn LedgerStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    config: EngineConfig,
}

impl Administration {
    pub fn new(
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

    // Accounts

    /// Open an account with the requested or configured opening balance
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the id is taken.
    #[tracing::instrument(name = "open_account", skip_all, fields(account = %new.id))]
    pub async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let opening_balance = new.opening_balance.unwrap_or(self.config.opening_balance);
        let account = self
            .config
            .retry
            .run("open_account", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                if tx.get::<Account>(new.id.as_str())?.is_some() {
                    return Err(LedgerError::already_exists(EntityKind::Account, &new.id));
                }
                let account = Account::open(new.clone(), opening_balance, Utc::now());
                tx.insert(account.clone());
                tx.commit()?;
                Ok(account)
            })
            .await?;
        info!(balance = account.balance, "account opened");
        Ok(account)
    }

    pub async fn set_role(&self, account_id: &AccountId, role: Role) -> Result<Account, LedgerError> {
        self.config
            .retry
            .run("set_role", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                let mut account: Account = tx.require(account_id.as_str())?;
                account.role = role;
                account.updated_at = Utc::now();
                tx.put(account.clone());
                tx.commit()?;
                Ok(account)
            })
            .await
    }

    /// Delete an account together with its orders, ledger records and
    /// idempotency markers, and clear its cooldown
    ///
    /// Any settlement committing against the account meanwhile changes its
    /// version, so the purge conflicts and rescans rather than leaving an
    /// orphaned record behind.
    #[tracing::instrument(name = "purge_account", skip_all, fields(account = %account_id))]
    pub async fn purge_account(&self, account_id: &AccountId) -> Result<PurgeSummary, LedgerError> {
        let summary = self
            .config
            .retry
            .run("purge_account", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                let account: Account = tx.require(account_id.as_str())?;

                let orders = self.owned_by::<Order>(account_id, |order| &order.account_id)?;
                let records =
                    self.owned_by::<TransactionRecord>(account_id, |record| &record.account_id)?;
                let markers =
                    self.owned_by::<IdempotencyMarker>(account_id, |marker| &marker.account_id)?;

                let summary = PurgeSummary {
                    orders: orders.len(),
                    transactions: records.len(),
                    idempotency_keys: markers.len(),
                };

                for order in &orders {
                    tx.delete(order.document_key());
                }
                for record in &records {
                    tx.delete(record.document_key());
                }
                for marker in &markers {
                    tx.delete(marker.document_key());
                }
                tx.delete(account.document_key());
                tx.commit()?;
                Ok(summary)
            })
            .await?;

        self.rate_limiter.forget(account_id);
        info!(
            orders = summary.orders,
            transactions = summary.transactions,
            "account purged"
        );
        Ok(summary)
    }

    // Catalog

    /// Add an active product to the catalog
    ///
    /// # Errors
    ///
    /// * `AlreadyExists` - the id is taken, retired products included
    /// * `InvalidRequest` - zero price
    pub async fn add_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        self.config
            .retry
            .run("add_product", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                if tx.get::<Product>(new.id.as_str())?.is_some() {
                    return Err(LedgerError::already_exists(EntityKind::Product, &new.id));
                }
                let product = Product::create(new.clone(), Utc::now())?;
                tx.insert(product.clone());
                tx.commit()?;
                Ok(product)
            })
            .await
    }

    /// Edit a catalog entry; existing orders keep their price snapshots
    pub async fn update_product(
        &self,
        product_id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Product, LedgerError> {
        self.config
            .retry
            .run("update_product", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                let mut product: Product = tx.require(product_id.as_str())?;
                product.apply_update(&update, Utc::now())?;
                tx.put(product.clone());
                tx.commit()?;
                Ok(product)
            })
            .await
    }

    /// Soft-delete a product: it leaves the catalog but its orders survive
    pub async fn retire_product(&self, product_id: &ProductId) -> Result<Product, LedgerError> {
        self.config
            .retry
            .run("retire_product", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                let mut product: Product = tx.require(product_id.as_str())?;
                if product.status == ProductStatus::Retired {
                    return Ok(product);
                }
                product.status = ProductStatus::Retired;
                product.updated_at = Utc::now();
                tx.put(product.clone());
                tx.commit()?;
                Ok(product)
            })
            .await
    }

    // Orders

    /// Move an order through the fulfilment state machine
    ///
    /// Setting the current status again is a no-op. Cancelling does not
    /// refund; see [`SettlementEngine::refund`](super::SettlementEngine::refund).
    ///
    /// # Errors
    ///
    /// `InvalidTransition` when the state machine forbids the move.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, LedgerError> {
        self.config
            .retry
            .run("update_order_status", |_| {
                let mut tx = LedgerTransaction::begin(self.store.as_ref());
                let mut order: Order = tx.require(order_id.as_str())?;
                if order.status == status {
                    return Ok(order);
                }
                if !order.status.can_transition_to(status) {
                    return Err(LedgerError::invalid_transition(
                        order.id.clone(),
                        order.status,
                        status,
                    ));
                }
                order.status = status;
                order.updated_at = Utc::now();
                tx.put(order.clone());
                tx.commit()?;
                Ok(order)
            })
            .await
    }

    // Queries

    pub fn account(&self, account_id: &AccountId) -> Result<Account, LedgerError> {
        self.load(account_id.as_str())
    }

    pub fn product(&self, product_id: &ProductId) -> Result<Product, LedgerError> {
        self.load(product_id.as_str())
    }

    pub fn order(&self, order_id: &OrderId) -> Result<Order, LedgerError> {
        self.load(order_id.as_str())
    }

    /// Every account, ordered by id
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.scan_all::<Account>()?;
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    /// Every product including retired ones, ordered by id
    pub fn products(&self) -> Result<Vec<Product>, LedgerError> {
        let mut products = self.scan_all::<Product>()?;
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    /// The purchasable catalog, ordered by id
    pub fn active_products(&self) -> Result<Vec<Product>, LedgerError> {
        let mut products = self.products()?;
        products.retain(Product::is_active);
        Ok(products)
    }

    /// An account's ledger, newest first
    pub fn transactions_for(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut records =
            self.owned_by::<TransactionRecord>(account_id, |record| &record.account_id)?;
        newest_records_first(&mut records);
        Ok(records)
    }

    /// An account's orders, newest first
    pub fn orders_for(&self, account_id: &AccountId) -> Result<Vec<Order>, LedgerError> {
        let mut orders = self.owned_by::<Order>(account_id, |order| &order.account_id)?;
        newest_orders_first(&mut orders);
        Ok(orders)
    }

    /// Profile, audit trail and acquisition history of one account
    ///
    /// All three come from one store snapshot, so the profile balance is the
    /// `balance_after` of the newest record in the trail.
    pub fn export_account_data(&self, account_id: &AccountId) -> Result<AccountExport, LedgerError> {
        let (profile, documents) =
            self.account_snapshot(account_id, &[Collection::Transactions, Collection::Orders])?;

        let mut audit_trail = Vec::new();
        let mut acquisition_history = Vec::new();
        for document in documents {
            match document {
                Document::Transaction(record) => audit_trail.push(record),
                Document::Order(order) => acquisition_history.push(order),
                _ => {}
            }
        }
        newest_records_first(&mut audit_trail);
        newest_orders_first(&mut acquisition_history);

        Ok(AccountExport {
            profile,
            audit_trail,
            acquisition_history,
            exported_at: Utc::now(),
        })
    }

    /// Replay an account's records and compare against its balance
    pub fn verify_ledger(&self, account_id: &AccountId) -> Result<LedgerAudit, LedgerError> {
        let (account, documents) =
            self.account_snapshot(account_id, &[Collection::Transactions])?;
        let records: Vec<TransactionRecord> = documents
            .into_iter()
            .filter_map(TransactionRecord::from_document)
            .collect();
        Ok(audit::replay(&account, &records))
    }

    /// An account and the documents of `collections` it owns, from one snapshot
    fn account_snapshot(
        &self,
        account_id: &AccountId,
        collections: &[Collection],
    ) -> Result<(Account, Vec<Document>), LedgerError> {
        let key = Account::key_for(account_id.as_str());
        let (stored, scanned) = self.store.read_with_scans(&key, collections)?;
        let stored =
            stored.ok_or_else(|| LedgerError::not_found(EntityKind::Account, account_id))?;
        let account = Account::from_document(stored.data).ok_or_else(|| {
            LedgerError::from(StoreError::Corrupt {
                collection: key.collection.to_string(),
                id: key.id.clone(),
            })
        })?;

        let owned = scanned
            .into_iter()
            .map(|versioned| versioned.data)
            .filter(|document| match document {
                Document::Transaction(record) => &record.account_id == account_id,
                Document::Order(order) => &order.account_id == account_id,
                _ => false,
            })
            .collect();
        Ok((account, owned))
    }

    fn load<E: Entity>(&self, id: &str) -> Result<E, LedgerError> {
        let mut tx = LedgerTransaction::begin(self.store.as_ref());
        tx.require(id)
    }

    fn scan_all<E: Entity>(&self) -> Result<Vec<E>, LedgerError> {
        self.store
            .scan(E::COLLECTION)?
            .into_iter()
            .map(|versioned| {
                let key = versioned.data.key();
                E::from_document(versioned.data).ok_or_else(|| {
                    LedgerError::from(StoreError::Corrupt {
                        collection: key.collection.to_string(),
                        id: key.id,
                    })
                })
            })
            .collect()
    }

    fn owned_by<E: Entity>(
        &self,
        account_id: &AccountId,
        owner: impl Fn(&E) -> &AccountId,
    ) -> Result<Vec<E>, LedgerError> {
        let mut entities = self.scan_all::<E>()?;
        entities.retain(|entity| owner(entity) == account_id);
        Ok(entities)
    }
}

fn newest_records_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.sequence.cmp(&a.sequence));
}

fn newest_orders_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PurchaseRequest, RetryPolicy, SettlementEngine, TopUpRequest};
    use crate::types::LineItemRequest;
    use std::time::Duration;

    fn engine() -> SettlementEngine {
        SettlementEngine::in_memory(EngineConfig::default().with_retry(RetryPolicy::new(
            5,
            Duration::from_micros(50),
            Duration::from_millis(1),
        )))
    }

    #[tokio::test]
    async fn test_open_account_grants_configured_balance() {
        let admin = engine().administration();
        let account = admin
            .open_account(NewAccount::new("alice", "alice@example.com", "Alice"))
            .await
            .unwrap();
        assert_eq!(account.balance, 1000);
        assert_eq!(account.role, Role::Customer);
        assert_eq!(admin.account(&"alice".into()).unwrap(), account);
    }

    #[tokio::test]
    async fn test_open_account_twice_is_rejected() {
        let admin = engine().administration();
        let new = NewAccount::new("alice", "alice@example.com", "Alice");
        admin.open_account(new.clone()).await.unwrap();
        assert_eq!(
            admin.open_account(new).await,
            Err(LedgerError::already_exists(EntityKind::Account, "alice"))
        );
    }

    #[tokio::test]
    async fn test_set_role() {
        let admin = engine().administration();
        admin
            .open_account(NewAccount::new("root", "root@example.com", "Root"))
            .await
            .unwrap();
        let account = admin.set_role(&"root".into(), Role::Admin).await.unwrap();
        assert_eq!(account.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_retired_products_leave_the_catalog() {
        let admin = engine().administration();
        admin
            .add_product(NewProduct::new("P1", "Headphones", 200, 5))
            .await
            .unwrap();
        admin
            .add_product(NewProduct::new("P2", "Headset", 450, 5))
            .await
            .unwrap();

        let retired = admin.retire_product(&"P1".into()).await.unwrap();
        assert_eq!(retired.status, ProductStatus::Retired);

        let active: Vec<_> = admin
            .active_products()
            .unwrap()
            .into_iter()
            .map(|product| product.id)
            .collect();
        assert_eq!(active, vec![ProductId::new("P2")]);
        assert_eq!(admin.products().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retired_id_cannot_be_reused() {
        let admin = engine().administration();
        admin
            .add_product(NewProduct::new("P1", "Headphones", 200, 5))
            .await
            .unwrap();
        admin.retire_product(&"P1".into()).await.unwrap();

        let result = admin.add_product(NewProduct::new("P1", "Other", 10, 1)).await;
        assert_eq!(
            result,
            Err(LedgerError::already_exists(EntityKind::Product, "P1"))
        );
    }

    #[tokio::test]
    async fn test_order_status_walks_the_state_machine() {
        let engine = engine();
        let admin = engine.administration();
        admin
            .open_account(NewAccount::new("alice", "alice@example.com", "Alice"))
            .await
            .unwrap();
        admin
            .add_product(NewProduct::new("P1", "Headphones", 200, 5))
            .await
            .unwrap();
        let order = engine
            .purchase(PurchaseRequest::new(
                "alice",
                vec![LineItemRequest::new("P1", 1)],
                "Home",
            ))
            .await
            .unwrap();

        let shipped = admin
            .update_order_status(&order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        let result = admin
            .update_order_status(&order.id, OrderStatus::Cancelled)
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));

        let delivered = admin
            .update_order_status(&order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_purge_removes_everything_owned() {
        let engine = engine();
        let admin = engine.administration();
        for id in ["alice", "bob"] {
            admin
                .open_account(NewAccount::new(id, format!("{}@example.com", id), id))
                .await
                .unwrap();
        }
        admin
            .add_product(NewProduct::new("P1", "Headphones", 200, 5))
            .await
            .unwrap();
        engine
            .top_up(TopUpRequest::new("alice", 500, "Credit Card").with_idempotency_key("k1"))
            .await
            .unwrap();
        engine
            .purchase(PurchaseRequest::new("alice", vec![LineItemRequest::new("P1", 1)], "Home"))
            .await
            .unwrap();
        engine
            .purchase(PurchaseRequest::new("bob", vec![LineItemRequest::new("P1", 1)], "Home"))
            .await
            .unwrap();

        let summary = admin.purge_account(&"alice".into()).await.unwrap();

        assert_eq!(
            summary,
            PurgeSummary {
                orders: 1,
                transactions: 2,
                idempotency_keys: 1
            }
        );
        assert_eq!(
            admin.account(&"alice".into()),
            Err(LedgerError::not_found(EntityKind::Account, "alice"))
        );
        assert!(admin.transactions_for(&"alice".into()).unwrap().is_empty());
        assert_eq!(admin.orders_for(&"bob".into()).unwrap().len(), 1);
        assert_eq!(admin.transactions_for(&"bob".into()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_clears_cooldown() {
        let engine = engine();
        let admin = engine.administration();
        let new = NewAccount::new("alice", "alice@example.com", "Alice");
        admin.open_account(new.clone()).await.unwrap();
        engine
            .top_up(TopUpRequest::new("alice", 500, "Credit Card"))
            .await
            .unwrap();

        admin.purge_account(&"alice".into()).await.unwrap();
        admin.open_account(new).await.unwrap();

        assert!(engine
            .top_up(TopUpRequest::new("alice", 500, "Credit Card"))
            .await
            .is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_audit_and_export_agree_while_purchases_commit() {
        let engine = engine();
        let admin = engine.administration();
        admin
            .open_account(
                NewAccount::new("alice", "alice@example.com", "Alice")
                    .with_opening_balance(1_000_000),
            )
            .await
            .unwrap();
        admin
            .add_product(NewProduct::new("P1", "Sticker", 1, 1_000_000))
            .await
            .unwrap();

        let buyer = engine.clone();
        let purchases = tokio::spawn(async move {
            for _ in 0..2_000 {
                buyer
                    .purchase(PurchaseRequest::new(
                        "alice",
                        vec![LineItemRequest::new("P1", 1)],
                        "Home",
                    ))
                    .await
                    .unwrap();
            }
        });

        loop {
            let done = purchases.is_finished();

            let audit = admin.verify_ledger(&"alice".into()).unwrap();
            assert!(audit.is_consistent(), "{:?}", audit.divergences);

            let export = admin.export_account_data(&"alice".into()).unwrap();
            let newest = export
                .audit_trail
                .first()
                .map_or(export.profile.opening_balance, |record| record.balance_after);
            assert_eq!(export.profile.balance, newest);
            assert_eq!(export.audit_trail.len(), export.acquisition_history.len());

            if done {
                break;
            }
            tokio::task::yield_now().await;
        }
        purchases.await.unwrap();
        assert_eq!(admin.transactions_for(&"alice".into()).unwrap().len(), 2_000);
    }

    #[tokio::test]
    async fn test_export_and_verify() {
        let engine = engine();
        let admin = engine.administration();
        admin
            .open_account(NewAccount::new("alice", "alice@example.com", "Alice"))
            .await
            .unwrap();
        admin
            .add_product(NewProduct::new("P1", "Headphones", 200, 5))
            .await
            .unwrap();
        engine
            .top_up(TopUpRequest::new("alice", 500, "Credit Card"))
            .await
            .unwrap();
        engine
            .purchase(PurchaseRequest::new("alice", vec![LineItemRequest::new("P1", 2)], "Home"))
            .await
            .unwrap();

        let export = admin.export_account_data(&"alice".into()).unwrap();
        assert_eq!(export.profile.balance, 1100);
        assert_eq!(export.acquisition_history.len(), 1);
        // Newest first
        let sequences: Vec<u64> = export.audit_trail.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);

        let audit = admin.verify_ledger(&"alice".into()).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.replayed_balance, 1100);
    }
}
