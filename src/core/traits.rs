//! Core traits for ledger storage and top-up rate limiting
//!
//! These are the seams where a process-local implementation can be swapped
//! for a shared one (a document database, a distributed cooldown table)
//! without touching the settlement logic.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::document::{Collection, Document, DocumentKey, Version, Versioned};
use crate::types::{AccountId, StoreError};

/// Version a commit expects a document to still have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGuard {
    pub key: DocumentKey,

    /// `None` asserts that the document must still be absent
    pub expected: Option<Version>,
}

/// One mutation of a commit
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document
    Put(Document),

    /// Remove a document
    Delete(DocumentKey),
}

/// Read-validate-write unit submitted to a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commit {
    pub reads: Vec<ReadGuard>,
    pub writes: Vec<WriteOp>,
}

/// Durable keyed storage with atomic multi-key conditional commits
///
/// Implementations must apply a commit entirely or not at all, and must
/// reject it with [`StoreError::Conflict`] when any read guard no longer
/// matches the stored version. Puts over an existing document of an
/// append-only collection must be rejected with
/// [`StoreError::ImmutableRecord`].
pub trait LedgerStore: Send + Sync + Debug {
    /// Read one document with its current version
    fn read(&self, key: &DocumentKey) -> Result<Option<Versioned<Document>>, StoreError>;

    /// Validate every read guard, then apply every write
    fn commit(&self, commit: Commit) -> Result<(), StoreError>;

    /// Read every document of a collection from one consistent snapshot
    fn scan(&self, collection: Collection) -> Result<Vec<Versioned<Document>>, StoreError>;

    /// Read one document and scan `collections`, all from the same snapshot
    ///
    /// No commit may land between the read and the scans, so documents
    /// written together (an account and its ledger records) are seen together.
    fn read_with_scans(
        &self,
        key: &DocumentKey,
        collections: &[Collection],
    ) -> Result<(Option<Versioned<Document>>, Vec<Versioned<Document>>), StoreError>;
}

/// Per-account cooldown between successful top-ups
pub trait RateLimiter: Send + Sync + Debug {
    /// Whether a top-up may start now; never records anything
    fn check_and_peek(&self, account: &AccountId, now: DateTime<Utc>) -> bool;

    /// Remaining cooldown, `None` when a top-up may start now
    fn retry_after(&self, account: &AccountId, now: DateTime<Utc>) -> Option<Duration>;

    /// Record a committed top-up
    fn commit(&self, account: &AccountId, now: DateTime<Utc>);

    /// Drop any state held for a purged account
    fn forget(&self, account: &AccountId);
}
