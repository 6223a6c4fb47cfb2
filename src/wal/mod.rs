//! Write-Ahead Log (WAL) Module
//!
//! Makes committed atomic batches durable for [`DurableStore`](crate::store::DurableStore).
//!
//! ## Responsibilities
//! - Append one entry per committed batch before the batch becomes visible
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) equal to the batch's versionstamp
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Data is the bincode encoding of the batch's operations and timestamp.
//! The CRC covers LSN, length and data.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use reader::{WalRead, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::{WalSink, WalWriter};
