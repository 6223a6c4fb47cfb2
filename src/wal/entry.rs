//! WAL Entry definitions
//!
//! One entry holds every mutation of one committed atomic batch.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{IndexKvError, Result};
use crate::store::Mutation;

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest data section accepted on read (64 MB)
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - the versionstamp of the logged batch
    pub lsn: u64,

    /// Mutations of the batch, in application order
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl From<&Mutation> for Operation {
    fn from(mutation: &Mutation) -> Self {
        match mutation {
            Mutation::Set { key, value } => Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            Mutation::Delete { key } => Operation::Delete { key: key.to_vec() },
        }
    }
}

impl From<Operation> for Mutation {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Put { key, value } => Mutation::Set {
                key: Bytes::from(key),
                value: Bytes::from(value),
            },
            Operation::Delete { key } => Mutation::Delete {
                key: Bytes::from(key),
            },
        }
    }
}

/// Serialized body of an entry (everything except the LSN)
#[derive(Serialize, Deserialize)]
struct EntryBody {
    operations: Vec<Operation>,
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Build an entry from a batch's mutations
    pub fn from_mutations(lsn: u64, mutations: &[Mutation]) -> Self {
        Self::new(lsn, mutations.iter().map(Operation::from).collect())
    }

    /// Convert back to store mutations (for replay)
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.operations.into_iter().map(Mutation::from).collect()
    }

    /// Serialize to a framed byte sequence: header + data
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = EntryBody {
            operations: self.operations.clone(),
            timestamp: self.timestamp,
        };
        let data = bincode::serialize(&body)?;
        let len = u32::try_from(data.len())
            .ok()
            .filter(|len| *len <= MAX_ENTRY_SIZE)
            .ok_or_else(|| {
                IndexKvError::Serialization(format!(
                    "WAL entry of {} bytes exceeds the {} byte limit",
                    data.len(),
                    MAX_ENTRY_SIZE
                ))
            })?;

        let crc = compute_crc(self.lsn, len, &data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Deserialize one framed entry, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(IndexKvError::WalCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = parse_header(bytes);
        if len > MAX_ENTRY_SIZE {
            return Err(IndexKvError::WalCorruption(format!(
                "entry length {} exceeds limit {}",
                len, MAX_ENTRY_SIZE
            )));
        }

        let end = HEADER_SIZE + len as usize;
        if bytes.len() < end {
            return Err(IndexKvError::WalCorruption(format!(
                "incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }

        let data = &bytes[HEADER_SIZE..end];
        let actual = compute_crc(lsn, len, data);
        if actual != crc {
            return Err(IndexKvError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let body: EntryBody = bincode::deserialize(data)
            .map_err(|e| IndexKvError::WalCorruption(format!("undecodable entry body: {}", e)))?;

        Ok(Self {
            lsn,
            operations: body.operations,
            timestamp: body.timestamp,
        })
    }

    /// Size of the framed entry described by a header, if the header is complete
    pub(crate) fn framed_len(bytes: &[u8]) -> Option<usize> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let (_, _, len) = parse_header(bytes);
        Some(HEADER_SIZE + len as usize)
    }
}

fn parse_header(bytes: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&bytes[0..8]);
    crc.copy_from_slice(&bytes[8..12]);
    len.copy_from_slice(&bytes[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    )
}

fn compute_crc(lsn: u64, len: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}
