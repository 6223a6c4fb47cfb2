//! Store Adapter Module
//!
//! The ordered, versioned key-value store the core runs on.
//!
//! ## Contract
//! - `get(key)`: value and version of one key, or absent
//! - `list(prefix)`: every entry under a prefix, in ascending key order
//! - `atomic_apply(batch)`: verify every check, then apply every mutation as
//!   one indivisible unit, or apply nothing and report the first failing check
//!
//! Every committed batch receives a fresh [`Versionstamp`], strictly greater
//! than all earlier ones, shared by every key the batch sets.
//!
//! ## Implementations
//! - [`MemoryStore`]: ordered map behind a RwLock
//! - [`DurableStore`]: memory state made durable by a write-ahead log

mod durable;
mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use durable::DurableStore;
pub use memory::MemoryStore;

/// Opaque version token of a committed write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versionstamp(u64);

impl Versionstamp {
    /// The version before any commit; never assigned to a stored key
    pub const ZERO: Versionstamp = Versionstamp(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:020x}", self.0)
    }
}

/// One stored key with its value and version
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub key: Bytes,
    pub value: Bytes,
    pub version: Versionstamp,
}

/// Assertion on a key's current version (`None` = key must be absent)
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub key: Bytes,
    pub expected: Option<Versionstamp>,
}

impl Check {
    pub fn absent(key: Bytes) -> Self {
        Self {
            key,
            expected: None,
        }
    }

    pub fn version(key: Bytes, version: Versionstamp) -> Self {
        Self {
            key,
            expected: Some(version),
        }
    }
}

/// A write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set { key: Bytes, value: Bytes },
    Delete { key: Bytes },
}

impl Mutation {
    pub fn key(&self) -> &Bytes {
        match self {
            Mutation::Set { key, .. } | Mutation::Delete { key } => key,
        }
    }
}

/// Checks and mutations applied as one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicBatch {
    pub checks: Vec<Check>,
    pub mutations: Vec<Mutation>,
}

impl AtomicBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, check: Check) -> &mut Self {
        self.checks.push(check);
        self
    }

    pub fn set(&mut self, key: Bytes, value: Bytes) -> &mut Self {
        self.mutations.push(Mutation::Set { key, value });
        self
    }

    pub fn delete(&mut self, key: Bytes) -> &mut Self {
        self.mutations.push(Mutation::Delete { key });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.mutations.is_empty()
    }
}

/// Result of `atomic_apply`
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Every check passed; all mutations are visible under this version
    Committed(Versionstamp),
    /// A check failed; nothing was applied
    Conflict { key: Bytes },
}

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn from_storage(e: impl fmt::Display) -> Self {
        StoreError::Storage(e.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Ordered iterator over listed entries
#[async_trait]
pub trait EntryIterator {
    async fn next(&mut self) -> StoreResult<Option<StoredEntry>>;
}

/// The ordered, versioned key-value store consumed by the core
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &[u8]) -> StoreResult<Option<StoredEntry>>;

    /// Entries whose key starts with `prefix`, ascending by key
    ///
    /// The iterator owns its data and may be held across await points.
    async fn list(&self, prefix: &[u8]) -> StoreResult<Box<dyn EntryIterator + Send + 'static>>;

    async fn atomic_apply(&self, batch: AtomicBatch) -> StoreResult<CommitOutcome>;

    /// Collects a whole listing into a Vec
    async fn list_all(&self, prefix: &[u8]) -> StoreResult<Vec<StoredEntry>> {
        let mut iter = self.list(prefix).await?;
        let mut entries = Vec::new();
        while let Some(entry) = iter.next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Iterator over a pre-collected, ordered set of entries
pub(crate) struct VecEntryIterator {
    entries: std::vec::IntoIter<StoredEntry>,
}

impl VecEntryIterator {
    pub(crate) fn new(entries: Vec<StoredEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

#[async_trait]
impl EntryIterator for VecEntryIterator {
    async fn next(&mut self) -> StoreResult<Option<StoredEntry>> {
        Ok(self.entries.next())
    }
}
