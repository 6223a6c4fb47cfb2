//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs;
use std::path::Path;

use super::{WalEntry, MAX_ENTRY_SIZE};
use crate::error::{IndexKvError, Result};

/// Outcome of reading one frame
#[derive(Debug)]
pub enum WalRead {
    /// A complete, checksum-valid entry
    Entry(WalEntry),

    /// Clean end of log
    End,

    /// The log ends inside a frame (a write was interrupted)
    TornTail { offset: u64 },

    /// A complete frame failed validation
    Corrupt { offset: u64, reason: String },
}

/// Reads entries from the WAL file
pub struct WalReader {
    data: Vec<u8>,
    position: usize,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(Self { data, position: 0 })
    }

    /// Read the next frame
    ///
    /// After `TornTail` or `Corrupt` the reader does not advance; every later
    /// call returns the same outcome.
    pub fn read_next(&mut self) -> WalRead {
        let remaining = &self.data[self.position..];
        if remaining.is_empty() {
            return WalRead::End;
        }

        let offset = self.position as u64;
        let framed_len = match WalEntry::framed_len(remaining) {
            Some(len) => len,
            None => return WalRead::TornTail { offset },
        };

        if framed_len - super::HEADER_SIZE > MAX_ENTRY_SIZE as usize {
            return WalRead::Corrupt {
                offset,
                reason: format!("entry length {} exceeds limit", framed_len),
            };
        }
        if remaining.len() < framed_len {
            return WalRead::TornTail { offset };
        }

        match WalEntry::deserialize(&remaining[..framed_len]) {
            Ok(entry) => {
                self.position += framed_len;
                WalRead::Entry(entry)
            }
            Err(e) => WalRead::Corrupt {
                offset,
                reason: e.to_string(),
            },
        }
    }

    /// Read the next entry, treating torn or corrupt frames as errors
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_next() {
            WalRead::Entry(entry) => Ok(Some(entry)),
            WalRead::End => Ok(None),
            WalRead::TornTail { offset } => Err(IndexKvError::WalCorruption(format!(
                "partial entry at offset {}",
                offset
            ))),
            WalRead::Corrupt { offset, reason } => Err(IndexKvError::WalCorruption(format!(
                "offset {}: {}",
                offset, reason
            ))),
        }
    }

    /// Byte offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    /// Iterate over all entries until the end or the first bad frame
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
