//! In-memory ledger store
//!
//! This module provides the `InMemoryLedgerStore`, a process-local
//! implementation of [`LedgerStore`] with per-document optimistic
//! concurrency.
//!
//! # Design
//!
//! Documents live in a `DashMap` keyed by [`DocumentKey`]. Every write
//! receives a fresh version from a store-wide counter, so a document that is
//! deleted and recreated never reuses an old version token.
//!
//! # Thread Safety
//!
//! A readers-writer gate separates commits from reads: single reads and
//! scans share the gate, a commit holds it exclusively while it validates its
//! read guards and applies its writes. No reader ever observes half of a
//! commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use tracing::trace;

use super::document::{Collection, Document, DocumentKey, Version, Versioned};
use super::traits::{Commit, LedgerStore, WriteOp};
use crate::types::StoreError;

/// Thread-safe, process-local ledger store
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    /// Current version of every stored document
    documents: DashMap<DocumentKey, Versioned<Document>>,

    /// Shared by reads, held exclusively by commits
    gate: RwLock<()>,

    /// Source of version tokens
    next_version: AtomicU64,
}

impl InMemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            gate: RwLock::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().collection == collection)
            .count()
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>, StoreError> {
        self.gate.read().map_err(|_| StoreError::Poisoned {
            message: "store gate poisoned".to_string(),
        })
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>, StoreError> {
        self.gate.write().map_err(|_| StoreError::Poisoned {
            message: "store gate poisoned".to_string(),
        })
    }

    fn get_unguarded(&self, key: &DocumentKey) -> Option<Versioned<Document>> {
        self.documents.get(key).map(|entry| entry.value().clone())
    }

    fn scan_unguarded(&self, collection: Collection) -> Vec<Versioned<Document>> {
        self.documents
            .iter()
            .filter(|entry| entry.key().collection == collection)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn current_version(&self, key: &DocumentKey) -> Option<Version> {
        self.documents.get(key).map(|entry| entry.version)
    }

    /// Check every read guard and append-only rule without mutating anything
    fn validate(&self, commit: &Commit) -> Result<(), StoreError> {
        for guard in &commit.reads {
            if self.current_version(&guard.key) != guard.expected {
                return Err(StoreError::Conflict {
                    collection: guard.key.collection.to_string(),
                    id: guard.key.id.clone(),
                });
            }
        }

        for write in &commit.writes {
            if let WriteOp::Put(document) = write {
                let key = document.key();
                if key.collection.is_append_only() && self.documents.contains_key(&key) {
                    return Err(StoreError::ImmutableRecord { id: key.id });
                }
            }
        }

        Ok(())
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn read(&self, key: &DocumentKey) -> Result<Option<Versioned<Document>>, StoreError> {
        let _gate = self.shared()?;
        Ok(self.get_unguarded(key))
    }

    fn commit(&self, commit: Commit) -> Result<(), StoreError> {
        let _gate = self.exclusive()?;

        self.validate(&commit)?;

        let writes = commit.writes.len();
        for write in commit.writes {
            match write {
                WriteOp::Put(document) => {
                    let version = Version(self.next_version.fetch_add(1, Ordering::Relaxed));
                    self.documents.insert(
                        document.key(),
                        Versioned {
                            data: document,
                            version,
                        },
                    );
                }
                WriteOp::Delete(key) => {
                    self.documents.remove(&key);
                }
            }
        }

        trace!(reads = commit.reads.len(), writes, "commit applied");
        Ok(())
    }

    fn scan(&self, collection: Collection) -> Result<Vec<Versioned<Document>>, StoreError> {
        let _gate = self.shared()?;
        Ok(self.scan_unguarded(collection))
    }

    fn read_with_scans(
        &self,
        key: &DocumentKey,
        collections: &[Collection],
    ) -> Result<(Option<Versioned<Document>>, Vec<Versioned<Document>>), StoreError> {
        let _gate = self.shared()?;
        let document = self.get_unguarded(key);
        let scanned = collections
            .iter()
            .flat_map(|&collection| self.scan_unguarded(collection))
            .collect();
        Ok((document, scanned))
    }
}
