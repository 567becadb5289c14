//! Documents, keys and version tokens of the ledger store
//!
//! The store holds one tagged [`Document`] per [`DocumentKey`]. Each stored
//! document carries a [`Version`] that changes on every committed write; a
//! commit names the versions it read, and is rejected if any of them moved.

use std::fmt;

use crate::types::{
    Account, EntityKind, IdempotencyMarker, Order, Product, TransactionRecord,
};

/// Collections of the ledger store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Accounts,
    Products,
    Orders,
    Transactions,
    IdempotencyKeys,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Accounts => "accounts",
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::Transactions => "transactions",
            Collection::IdempotencyKeys => "idempotency_keys",
        }
    }

    /// Documents in append-only collections may be created or purged, never overwritten
    pub fn is_append_only(self) -> bool {
        matches!(self, Collection::Transactions)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub collection: Collection,
    pub id: String,
}

impl DocumentKey {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Opaque version token of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

/// A document together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub data: T,
    pub version: Version,
}

/// Any entity the ledger store can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Account(Account),
    Product(Product),
    Order(Order),
    Transaction(TransactionRecord),
    Idempotency(IdempotencyMarker),
}

impl Document {
    pub fn key(&self) -> DocumentKey {
        match self {
            Document::Account(account) => account.document_key(),
            Document::Product(product) => product.document_key(),
            Document::Order(order) => order.document_key(),
            Document::Transaction(record) => record.document_key(),
            Document::Idempotency(marker) => marker.document_key(),
        }
    }
}

/// Typed view over one collection
pub trait Entity: Clone + Sized {
    const COLLECTION: Collection;
    const KIND: EntityKind;

    /// Id of this entity within its collection
    fn storage_id(&self) -> String;

    fn into_document(self) -> Document;

    /// Unwrap a document of this entity's collection; `None` on a type mismatch
    fn from_document(document: Document) -> Option<Self>;

    fn key_for(id: &str) -> DocumentKey {
        DocumentKey::new(Self::COLLECTION, id)
    }

    fn document_key(&self) -> DocumentKey {
        DocumentKey::new(Self::COLLECTION, self.storage_id())
    }
}

macro_rules! entity {
    ($ty:ty, $variant:ident, $collection:ident, $kind:ident, |$this:ident| $id:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = Collection::$collection;
            const KIND: EntityKind = EntityKind::$kind;

            fn storage_id(&self) -> String {
                let $this = self;
                $id
            }

            fn into_document(self) -> Document {
                Document::$variant(self)
            }

            fn from_document(document: Document) -> Option<Self> {
                match document {
                    Document::$variant(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

entity!(Account, Account, Accounts, Account, |this| this.id.to_string());
entity!(Product, Product, Products, Product, |this| this.id.to_string());
entity!(Order, Order, Orders, Order, |this| this.id.to_string());
entity!(TransactionRecord, Transaction, Transactions, Transaction, |this| this
    .id
    .to_string());
entity!(IdempotencyMarker, Idempotency, IdempotencyKeys, IdempotencyKey, |this| {
    IdempotencyMarker::scoped_id(&this.account_id, &this.key)
});
