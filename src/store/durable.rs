//! Durable store
//!
//! [`MemoryStore`] state made durable by a write-ahead log.
//!
//! ## Commit Path
//! 1. Take the memory store's write lock and verify the batch's checks
//! 2. Append the batch to the WAL under its new versionstamp
//! 3. Apply the batch to memory (only now is it visible to readers)
//!
//! A failed WAL append leaves memory untouched, so a batch is visible only
//! if it is also in the log. A batch whose frame reached the OS but whose
//! fsync failed is applied, matching what replay restores; the log is then
//! poisoned and later commits fail until the store is reopened.
//!
//! ## Recovery
//! On open, the valid prefix of the WAL is replayed in LSN order, which
//! restores every key together with the versionstamp that wrote it.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    AtomicBatch, CommitOutcome, EntryIterator, MemoryStore, Store, StoreError, StoreResult,
    StoredEntry, Versionstamp,
};
use crate::config::Config;
use crate::error::Result;
use crate::wal::{RecoveryResult, WalEntry, WalRecovery, WalWriter};

/// Ordered, versioned store backed by a write-ahead log
pub struct DurableStore {
    /// Store configuration
    config: Config,

    /// Path of the write-ahead log
    wal_path: PathBuf,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Live key space (internal RwLock)
    state: MemoryStore,

    /// What recovery found when this store was opened
    recovery: RecoveryResult,
}

impl DurableStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create a durable store with the given config
    ///
    /// On startup:
    /// 1. Create data directory if needed
    /// 2. Recover the WAL (truncating a torn or corrupted tail)
    /// 3. Replay recovered batches into memory
    /// 4. Reopen the WAL for appending
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let state = MemoryStore::new();

        let recovery = if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            for entry in entries {
                let version = Versionstamp::new(entry.lsn);
                state.replay(version, &entry.into_mutations());
            }
            recovery
        } else {
            RecoveryResult {
                entries_recovered: 0,
                entries_corrupted: 0,
                last_lsn: 0,
                was_truncated: false,
                valid_len: 0,
            }
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            recovered = recovery.entries_recovered,
            corrupted = recovery.entries_corrupted,
            last_lsn = recovery.last_lsn,
            keys = state.len(),
            "durable store opened"
        );

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, recovery.last_lsn)?;

        Ok(Self {
            config,
            wal_path,
            wal: Mutex::new(wal),
            state,
            recovery,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Sync the WAL to disk
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// Close the store gracefully, syncing any buffered log entries
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the WAL path
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Recovery statistics from open
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Version of the most recent commit
    pub fn last_version(&self) -> Versionstamp {
        self.state.last_version()
    }
}

#[async_trait]
impl Store for DurableStore {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn get(&self, key: &[u8]) -> StoreResult<Option<StoredEntry>> {
        self.state.get(key).await
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn list(&self, prefix: &[u8]) -> StoreResult<Box<dyn EntryIterator + Send + 'static>> {
        self.state.list(prefix).await
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn atomic_apply(&self, batch: AtomicBatch) -> StoreResult<CommitOutcome> {
        self.state.commit_with(batch, |version, mutations| {
            let entry = WalEntry::from_mutations(version.as_u64(), mutations);
            self.wal
                .lock()
                .append(&entry)
                .map(|_| ())
                .map_err(StoreError::from_storage)
        })
    }
}
