//! In-memory store
//!
//! BTreeMap-based ordered store with a RwLock for concurrency.
//!
//! ## Concurrency Model
//! - Reads (`get`/`list`) take the read lock and copy out what they return
//! - `atomic_apply` takes the write lock for check + apply, so no reader can
//!   observe half of a batch
//! - Versionstamps come from a counter advanced only under the write lock

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{
    AtomicBatch, Check, CommitOutcome, EntryIterator, Mutation, Store, StoreResult, StoredEntry,
    VecEntryIterator, Versionstamp,
};

/// Value stored under a key together with the version that wrote it
#[derive(Debug, Clone)]
struct VersionedValue {
    value: Bytes,
    version: Versionstamp,
}

#[derive(Debug, Default)]
struct MemoryState {
    data: BTreeMap<Bytes, VersionedValue>,
    last_version: Versionstamp,
}

impl MemoryState {
    /// Key of the first check that does not hold, if any
    fn first_failed_check(&self, checks: &[Check]) -> Option<Bytes> {
        checks
            .iter()
            .find(|check| {
                let current = self.data.get(&check.key).map(|v| v.version);
                current != check.expected
            })
            .map(|check| check.key.clone())
    }

    fn apply(&mut self, version: Versionstamp, mutations: &[Mutation]) {
        for mutation in mutations {
            match mutation {
                Mutation::Set { key, value } => {
                    self.data.insert(
                        key.clone(),
                        VersionedValue {
                            value: value.clone(),
                            version,
                        },
                    );
                }
                Mutation::Delete { key } => {
                    self.data.remove(key);
                }
            }
        }
        if version > self.last_version {
            self.last_version = version;
        }
    }
}

/// Ordered, versioned in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys (primary and index keys alike)
    pub fn len(&self) -> usize {
        self.state.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().data.is_empty()
    }

    /// Version of the most recent commit
    pub fn last_version(&self) -> Versionstamp {
        self.state.read().last_version
    }

    /// Check and commit `batch` under the write lock
    ///
    /// `log` runs after the checks pass and before the batch becomes visible;
    /// if it fails, nothing is applied and the version counter is unchanged.
    pub(crate) fn commit_with<F>(&self, batch: AtomicBatch, log: F) -> StoreResult<CommitOutcome>
    where
        F: FnOnce(Versionstamp, &[Mutation]) -> StoreResult<()>,
    {
        let mut state = self.state.write();

        if let Some(key) = state.first_failed_check(&batch.checks) {
            tracing::trace!(checks = batch.checks.len(), "atomic batch rejected");
            return Ok(CommitOutcome::Conflict { key });
        }

        let version = state.last_version.next();
        log(version, &batch.mutations)?;
        state.apply(version, &batch.mutations);

        tracing::trace!(
            version = version.as_u64(),
            mutations = batch.mutations.len(),
            "atomic batch committed"
        );
        Ok(CommitOutcome::Committed(version))
    }

    /// Re-apply an already committed batch (WAL replay)
    pub(crate) fn replay(&self, version: Versionstamp, mutations: &[Mutation]) {
        self.state.write().apply(version, mutations);
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn get(&self, key: &[u8]) -> StoreResult<Option<StoredEntry>> {
        let state = self.state.read();
        Ok(state.data.get(key).map(|stored| StoredEntry {
            key: Bytes::copy_from_slice(key),
            value: stored.value.clone(),
            version: stored.version,
        }))
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn list(&self, prefix: &[u8]) -> StoreResult<Box<dyn EntryIterator + Send + 'static>> {
        let state = self.state.read();
        let start = Bytes::copy_from_slice(prefix);
        let entries: Vec<StoredEntry> = state
            .data
            .range(start..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, stored)| StoredEntry {
                key: key.clone(),
                value: stored.value.clone(),
                version: stored.version,
            })
            .collect();

        Ok(Box::new(VecEntryIterator::new(entries)))
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn atomic_apply(&self, batch: AtomicBatch) -> StoreResult<CommitOutcome> {
        self.commit_with(batch, |_, _| Ok(()))
    }
}
