//! One attempt of a read-modify-write against the ledger store
//!
//! A `LedgerTransaction` records the version of every document it reads and
//! buffers every write. Nothing reaches the store until [`commit`], which
//! submits the whole read set as guards, so any concurrent change to anything
//! the attempt looked at rejects the attempt as a unit.
//!
//! Reads are cached: reading the same key twice within an attempt returns the
//! first snapshot, keeping validation and writes consistent with each other.
//!
//! [`commit`]: LedgerTransaction::commit

use std::collections::BTreeMap;

use super::document::{Document, DocumentKey, Entity, Versioned};
use super::traits::{Commit, LedgerStore, ReadGuard, WriteOp};
use crate::types::{LedgerError, StoreError};

/// Buffered read set and write set of one attempt
#[derive(Debug)]
pub struct LedgerTransaction<'a> {
    store: &'a dyn LedgerStore,
    snapshots: BTreeMap<DocumentKey, Option<Versioned<Document>>>,
    writes: Vec<WriteOp>,
}

impl<'a> LedgerTransaction<'a> {
    pub fn begin(store: &'a dyn LedgerStore) -> Self {
        Self {
            store,
            snapshots: BTreeMap::new(),
            writes: Vec::new(),
        }
    }

    fn snapshot(&mut self, key: DocumentKey) -> Result<Option<Document>, StoreError> {
        if let Some(cached) = self.snapshots.get(&key) {
            return Ok(cached.as_ref().map(|versioned| versioned.data.clone()));
        }
        let fetched = self.store.read(&key)?;
        let data = fetched.as_ref().map(|versioned| versioned.data.clone());
        self.snapshots.insert(key, fetched);
        Ok(data)
    }

    /// Read an entity, adding it (or its absence) to the conflict set
    pub fn get<E: Entity>(&mut self, id: &str) -> Result<Option<E>, LedgerError> {
        let key = E::key_for(id);
        match self.snapshot(key.clone())? {
            None => Ok(None),
            Some(document) => E::from_document(document).map(Some).ok_or_else(|| {
                StoreError::Corrupt {
                    collection: key.collection.to_string(),
                    id: key.id,
                }
                .into()
            }),
        }
    }

    /// Read an entity that must exist
    ///
    /// # Errors
    ///
    /// `NotFound` naming the entity kind and id.
    pub fn require<E: Entity>(&mut self, id: &str) -> Result<E, LedgerError> {
        self.get(id)?
            .ok_or_else(|| LedgerError::not_found(E::KIND, id))
    }

    /// Buffer a create-or-replace
    pub fn put<E: Entity>(&mut self, entity: E) {
        self.writes.push(WriteOp::Put(entity.into_document()));
    }

    /// Buffer a create that must not clobber an existing document
    ///
    /// The key joins the conflict set as "absent", so a document created
    /// under the same id by someone else makes the commit conflict.
    pub fn insert<E: Entity>(&mut self, entity: E) {
        let key = entity.document_key();
        self.snapshots.entry(key).or_insert(None);
        self.put(entity);
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: DocumentKey) {
        self.writes.push(WriteOp::Delete(key));
    }

    /// Submit the attempt
    ///
    /// # Errors
    ///
    /// A `Store` error; conflicts are retryable.
    pub fn commit(self) -> Result<(), LedgerError> {
        let reads = self
            .snapshots
            .into_iter()
            .map(|(key, snapshot)| ReadGuard {
                key,
                expected: snapshot.map(|versioned| versioned.version),
            })
            .collect();

        self.store
            .commit(Commit {
                reads,
                writes: self.writes,
            })
            .map_err(LedgerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger_store::InMemoryLedgerStore;
    use crate::types::{EntityKind, NewProduct, Product};
    use chrono::Utc;

    fn seeded_store() -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        let mut tx = LedgerTransaction::begin(&store);
        tx.insert(Product::create(NewProduct::new("P1", "Widget", 200, 5), Utc::now()).unwrap());
        tx.commit().unwrap();
        store
    }

    #[test]
    fn test_require_missing_entity_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let mut tx = LedgerTransaction::begin(&store);
        let result = tx.require::<Product>("P404");
        assert_eq!(
            result,
            Err(LedgerError::not_found(EntityKind::Product, "P404"))
        );
    }

    #[test]
    fn test_writes_are_invisible_until_commit() {
        let store = seeded_store();
        let mut tx = LedgerTransaction::begin(&store);
        let mut product: Product = tx.require("P1").unwrap();
        product.stock = 1;
        tx.put(product);

        let mut observer = LedgerTransaction::begin(&store);
        assert_eq!(observer.require::<Product>("P1").unwrap().stock, 5);

        tx.commit().unwrap();
        let mut observer = LedgerTransaction::begin(&store);
        assert_eq!(observer.require::<Product>("P1").unwrap().stock, 1);
    }

    #[test]
    fn test_repeated_reads_return_first_snapshot() {
        let store = seeded_store();
        let mut tx = LedgerTransaction::begin(&store);
        let first: Product = tx.require("P1").unwrap();

        let mut other = LedgerTransaction::begin(&store);
        let mut changed: Product = other.require("P1").unwrap();
        changed.stock = 0;
        other.put(changed);
        other.commit().unwrap();

        let second: Product = tx.require("P1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_commit_conflicts_when_read_entity_changed() {
        let store = seeded_store();
        let mut tx = LedgerTransaction::begin(&store);
        let mut product: Product = tx.require("P1").unwrap();

        let mut other = LedgerTransaction::begin(&store);
        let mut concurrent: Product = other.require("P1").unwrap();
        concurrent.stock = 4;
        other.put(concurrent);
        other.commit().unwrap();

        product.stock -= 2;
        tx.put(product);
        let result = tx.commit();
        assert!(result.as_ref().is_err_and(LedgerError::is_retryable));
    }

    #[test]
    fn test_insert_conflicts_with_existing_document() {
        let store = seeded_store();
        let mut tx = LedgerTransaction::begin(&store);
        tx.insert(Product::create(NewProduct::new("P1", "Clone", 1, 1), Utc::now()).unwrap());
        let result = tx.commit();
        assert!(matches!(
            result,
            Err(LedgerError::Store(StoreError::Conflict { .. }))
        ));
    }
}
