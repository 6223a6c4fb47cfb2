//! # indexkv
//!
//! A schema-driven access layer over an ordered, versioned key-value store:
//! - Table definitions with one primary key and any number of secondary indexes
//! - Every write touches the primary record and all index entries atomically
//! - Optimistic concurrency through per-key versionstamps (no locks held)
//! - Direct index lookups where a predicate allows, ordered scans otherwise
//! - In-memory and WAL-backed durable store implementations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Query Executor                          │
//! │   create / update / delete / find  (+ bulk variants)         │
//! └──────────┬──────────────────┬──────────────────┬────────────┘
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │ Key Encoder  │   │Index Planner │   │Atomic Writer │
//!   │ (pure)       │   │ Direct/Scan  │   │ checks + set │
//!   └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                             │                  │
//!                             ▼                  ▼
//!                     ┌─────────────────────────────────┐
//!                     │          Store Adapter          │
//!                     │  get / list / atomic_apply      │
//!                     └───────┬─────────────────┬───────┘
//!                             │                 │
//!                             ▼                 ▼
//!                      ┌─────────────┐   ┌─────────────┐
//!                      │ MemoryStore │   │DurableStore │
//!                      │  (RwLock)   │   │ (+ WAL)     │
//!                      └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod value;

pub mod schema;
pub mod keys;
pub mod planner;
pub mod writer;
pub mod executor;

pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{BatchMode, Config, WalSyncStrategy};
pub use error::{IndexKvError, Operation, Result};
pub use executor::{Query, QueryExecutor};
pub use keys::{encode_keys, EntityKeys, PhysicalKey};
pub use planner::{AccessKey, Condition, LookupPlan, Where};
pub use schema::{FieldDef, FieldRole, FieldType, TableDefinition};
pub use store::{DurableStore, MemoryStore, Store, Versionstamp};
pub use value::{Entity, Record, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of indexkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
