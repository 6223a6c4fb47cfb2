//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! An entry counts as written once its frame has been flushed to the OS. A
//! later fsync failure cannot take that frame back, so it does not fail the
//! append; it poisons the writer and every further append is refused until
//! the log is reopened and recovered.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::WalEntry;
use crate::config::WalSyncStrategy;
use crate::error::{IndexKvError, Result};

/// Byte sink a [`WalWriter`] appends frames to
pub trait WalSink: Write + Send {
    /// Make everything written so far durable
    fn sync_data(&mut self) -> io::Result<()>;
}

impl WalSink for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes entries to the WAL file
pub struct WalWriter {
    writer: BufWriter<Box<dyn WalSink>>,
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Set when a write or sync failed; the log tail is no longer trustworthy
    failed: bool,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// `last_lsn` is the LSN of the last entry already in the file (0 for a
    /// new log); appended entries must carry strictly greater LSNs.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_sink(Box::new(file), sync_strategy, last_lsn))
    }

    /// Writer over an arbitrary sink positioned after `last_lsn`
    pub fn from_sink(sink: Box<dyn WalSink>, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Self {
        Self {
            writer: BufWriter::new(sink),
            current_lsn: last_lsn,
            sync_strategy,
            unsynced: 0,
            failed: false,
        }
    }

    /// Append an entry to the WAL
    ///
    /// `Err` means the frame never reached the OS. `Ok` means it did, even if
    /// the fsync that followed failed; in that case the writer is poisoned.
    pub fn append(&mut self, entry: &WalEntry) -> Result<u64> {
        if entry.lsn <= self.current_lsn {
            return Err(IndexKvError::WalWrite(format!(
                "LSN {} is not greater than current LSN {}",
                entry.lsn, self.current_lsn
            )));
        }

        if self.failed {
            return Err(IndexKvError::WalWrite(
                "an earlier write or sync failed; reopen the log to recover".to_string(),
            ));
        }

        let bytes = entry.serialize()?;
        if let Err(e) = self.writer.write_all(&bytes).and_then(|_| self.writer.flush()) {
            self.failed = true;
            return Err(e.into());
        }
        self.current_lsn = entry.lsn;
        self.unsynced += 1;

        let should_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if should_sync {
            if let Err(e) = self.sync() {
                tracing::error!(
                    lsn = entry.lsn,
                    error = %e,
                    "WAL sync failed; further appends refused until reopen"
                );
            }
        }

        Ok(entry.lsn)
    }

    /// Force sync to disk; a failure poisons the writer
    pub fn sync(&mut self) -> Result<()> {
        if self.failed {
            return Err(IndexKvError::WalWrite(
                "an earlier write or sync failed; reopen the log to recover".to_string(),
            ));
        }
        let result = self
            .writer
            .flush()
            .and_then(|_| self.writer.get_mut().sync_data());
        if let Err(e) = result {
            self.failed = true;
            return Err(e.into());
        }
        self.unsynced = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// True once a write or sync has failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
