//! Error types for indexkv
//!
//! Every failure the core can produce is a tagged variant carrying the table
//! and key it concerns, so callers branch on kind rather than message text.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;
use crate::value::{Record, Value};

/// Result type alias using IndexKvError
pub type Result<T> = std::result::Result<T, IndexKvError>;

/// Which verb produced a batch or zero-row failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Unified error type for indexkv operations
#[derive(Debug, Error)]
pub enum IndexKvError {
    // -------------------------------------------------------------------------
    // Schema Errors (caller bugs, never retried)
    // -------------------------------------------------------------------------
    #[error("Schema mismatch on table `{table}`, field `{field}`: {reason}")]
    SchemaMismatch {
        table: String,
        field: String,
        reason: String,
    },

    #[error("Invalid table definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid access key for table `{table}`: {reason}")]
    InvalidAccessKey { table: String, reason: String },

    #[error("Primary key of table `{table}` cannot be changed by an update")]
    PrimaryKeyChange { table: String },

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate key in `{namespace}` for table `{table}`: {key}")]
    DuplicateKey {
        table: String,
        namespace: String,
        key: Value,
    },

    #[error("Conflicting write on `{namespace}` for table `{table}`: {key} was modified or deleted")]
    Conflict {
        table: String,
        namespace: String,
        key: Value,
    },

    #[error("Atomic batch on table `{table}` touches {keys} keys (limit {limit})")]
    BatchTooLarge {
        table: String,
        keys: usize,
        limit: usize,
    },

    #[error("{operation} on table `{table}` stopped after {} applied item(s): {source}", applied.len())]
    PartialBatch {
        table: String,
        operation: Operation,
        applied: Vec<Record>,
        #[source]
        source: Box<IndexKvError>,
    },

    // -------------------------------------------------------------------------
    // Resolution Errors
    // -------------------------------------------------------------------------
    #[error("No record matched the {operation} on table `{table}`")]
    NoMatch { table: String, operation: Operation },

    #[error("Zero rows matched the {operation} on table `{table}`")]
    UpdateZeroRows { table: String, operation: Operation },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // WAL / Durability Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexKvError {
    /// True for optimistic-concurrency failures a caller may retry after re-reading
    pub fn is_conflict(&self) -> bool {
        match self {
            IndexKvError::Conflict { .. } => true,
            IndexKvError::PartialBatch { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// True when a uniqueness check (primary or secondary index) failed
    pub fn is_duplicate(&self) -> bool {
        match self {
            IndexKvError::DuplicateKey { .. } => true,
            IndexKvError::PartialBatch { source, .. } => source.is_duplicate(),
            _ => false,
        }
    }

    /// Records a best-effort batch committed before it failed
    pub fn applied(&self) -> &[Record] {
        match self {
            IndexKvError::PartialBatch { applied, .. } => applied,
            _ => &[],
        }
    }

    pub(crate) fn schema_mismatch(
        table: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        IndexKvError::SchemaMismatch {
            table: table.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_access_key(table: &str, reason: impl Into<String>) -> Self {
        IndexKvError::InvalidAccessKey {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for IndexKvError {
    fn from(err: bincode::Error) -> Self {
        IndexKvError::Serialization(err.to_string())
    }
}
