//! Configuration for indexkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an executor and its durable store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Executor Configuration
    // -------------------------------------------------------------------------
    /// Mode used by `create_many` when the caller does not pick one
    pub batch_mode: BatchMode,

    /// Upper bound on keys touched by a single atomic batch
    /// (checked before a cross-item batch is sent to the store)
    pub max_atomic_keys: usize,

    // -------------------------------------------------------------------------
    // Durable Store Configuration
    // -------------------------------------------------------------------------
    /// Root directory for durable store files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── wal.log          (write-ahead log of committed batches)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,
}

/// How `create_many` commits its items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One atomic batch spanning every item: all are created or none are
    Atomic,

    /// Item by item; a failure leaves earlier items committed and reports them
    Sequential,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_mode: BatchMode::Sequential,
            max_atomic_keys: 1000,
            data_dir: PathBuf::from("./indexkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the default `create_many` mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.config.batch_mode = mode;
        self
    }

    /// Set the key limit for a single atomic batch
    pub fn max_atomic_keys(mut self, limit: usize) -> Self {
        self.config.max_atomic_keys = limit;
        self
    }

    /// Set the data directory (root for durable storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
