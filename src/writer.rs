//! Atomic Writer
//!
//! Turns one logical write into one atomic batch over every key the entity
//! owns, so the primary record and its index entries never diverge.
//!
//! | write  | checks                                         | mutations                      |
//! |--------|------------------------------------------------|--------------------------------|
//! | create | primary absent, each index absent              | set primary, set each index    |
//! | update | primary @v, each old index @v, moved index absent | set primary, set/move indexes |
//! | delete | primary @v                                     | delete primary and each index  |

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::{IndexKvError, Result};
use crate::keys::{encode_keys, EntityKeys, PhysicalKey};
use crate::schema::TableDefinition;
use crate::store::{AtomicBatch, Check, CommitOutcome, Store, Versionstamp};
use crate::value::{Entity, Record};

/// Create one entity; fails with `DuplicateKey` if any of its keys exists
pub async fn write_create<S>(
    store: &S,
    definition: &TableDefinition,
    keys: &EntityKeys,
    entity: &Entity,
) -> Result<Versionstamp>
where
    S: Store + ?Sized,
{
    let value = entity.to_bytes()?;
    let mut batch = AtomicBatch::new();
    push_create(&mut batch, keys, &value);

    match store.atomic_apply(batch).await? {
        CommitOutcome::Committed(version) => {
            tracing::debug!(table = definition.name(), key = %keys.primary, %version, "created");
            Ok(version)
        }
        CommitOutcome::Conflict { key } => Err(duplicate(definition, &key)),
    }
}

/// Create several entities in a single atomic batch
///
/// Keys shared between the items themselves are rejected before anything is
/// sent; so is a batch touching more than `max_keys` keys.
pub async fn write_create_batch<S>(
    store: &S,
    definition: &TableDefinition,
    items: &[(EntityKeys, Entity)],
    max_keys: usize,
) -> Result<Versionstamp>
where
    S: Store + ?Sized,
{
    let total_keys: usize = items.iter().map(|(keys, _)| keys.key_count()).sum();
    if total_keys > max_keys {
        return Err(IndexKvError::BatchTooLarge {
            table: definition.name().to_string(),
            keys: total_keys,
            limit: max_keys,
        });
    }

    let mut seen = HashSet::with_capacity(total_keys);
    let mut batch = AtomicBatch::new();
    for (keys, entity) in items {
        for key in keys.all() {
            if !seen.insert(key.encode()) {
                return Err(IndexKvError::DuplicateKey {
                    table: definition.name().to_string(),
                    namespace: key.namespace.clone(),
                    key: key.value.clone(),
                });
            }
        }
        push_create(&mut batch, keys, &entity.to_bytes()?);
    }

    match store.atomic_apply(batch).await? {
        CommitOutcome::Committed(version) => {
            tracing::debug!(
                table = definition.name(),
                items = items.len(),
                %version,
                "created batch"
            );
            Ok(version)
        }
        CommitOutcome::Conflict { key } => Err(duplicate(definition, &key)),
    }
}

/// Replace `existing` with `new_entity`, moving index keys whose value changed
///
/// `Conflict` if the record changed since it was read, `DuplicateKey` if a
/// moved index value is already taken, `PrimaryKeyChange` if the primary-key
/// value differs.
pub async fn write_update<S>(
    store: &S,
    definition: &TableDefinition,
    existing: &Record,
    new_entity: &Entity,
) -> Result<Versionstamp>
where
    S: Store + ?Sized,
{
    let old_keys = encode_keys(definition, &existing.entity)?;
    let new_keys = encode_keys(definition, new_entity)?;
    if old_keys.primary != new_keys.primary {
        return Err(IndexKvError::PrimaryKeyChange {
            table: definition.name().to_string(),
        });
    }

    let value = new_entity.to_bytes()?;
    let mut batch = AtomicBatch::new();
    let mut claimed: Vec<Bytes> = Vec::new();

    let primary = old_keys.primary.encode();
    batch.check(Check::version(primary.clone(), existing.version));
    batch.set(primary, value.clone());

    for (old, new) in old_keys.indexes.iter().zip(&new_keys.indexes) {
        let old_key = old.key.encode();
        batch.check(Check::version(old_key.clone(), existing.version));

        if old.key == new.key {
            batch.set(old_key, value.clone());
        } else {
            let new_key = new.key.encode();
            batch.check(Check::absent(new_key.clone()));
            batch.delete(old_key);
            batch.set(new_key.clone(), value.clone());
            claimed.push(new_key);
        }
    }

    match store.atomic_apply(batch).await? {
        CommitOutcome::Committed(version) => {
            tracing::debug!(
                table = definition.name(),
                key = %old_keys.primary,
                moved_indexes = claimed.len(),
                %version,
                "updated"
            );
            Ok(version)
        }
        CommitOutcome::Conflict { key } if claimed.contains(&key) => {
            Err(duplicate(definition, &key))
        }
        CommitOutcome::Conflict { key } => Err(conflict(definition, &key)),
    }
}

/// Delete `existing` and every index entry derived from it
pub async fn write_delete<S>(
    store: &S,
    definition: &TableDefinition,
    existing: &Record,
) -> Result<()>
where
    S: Store + ?Sized,
{
    let keys = encode_keys(definition, &existing.entity)?;

    let mut batch = AtomicBatch::new();
    batch.check(Check::version(keys.primary.encode(), existing.version));
    for key in keys.all() {
        batch.delete(key.encode());
    }

    match store.atomic_apply(batch).await? {
        CommitOutcome::Committed(version) => {
            tracing::debug!(table = definition.name(), key = %keys.primary, %version, "deleted");
            Ok(())
        }
        CommitOutcome::Conflict { key } => Err(conflict(definition, &key)),
    }
}

fn push_create(batch: &mut AtomicBatch, keys: &EntityKeys, value: &Bytes) {
    for key in keys.all() {
        let encoded = key.encode();
        batch.check(Check::absent(encoded.clone()));
        batch.set(encoded, value.clone());
    }
}

fn duplicate(definition: &TableDefinition, key: &[u8]) -> IndexKvError {
    let (namespace, value) = describe(key);
    tracing::debug!(table = definition.name(), %namespace, key = %value, "duplicate key");
    IndexKvError::DuplicateKey {
        table: definition.name().to_string(),
        namespace,
        key: value,
    }
}

fn conflict(definition: &TableDefinition, key: &[u8]) -> IndexKvError {
    let (namespace, value) = describe(key);
    tracing::debug!(table = definition.name(), %namespace, key = %value, "version conflict");
    IndexKvError::Conflict {
        table: definition.name().to_string(),
        namespace,
        key: value,
    }
}

/// Decode a store key for error context; raw bytes if it is not one of ours
fn describe(key: &[u8]) -> (String, crate::value::Value) {
    match PhysicalKey::decode(key) {
        Ok(physical) => (physical.namespace, physical.value),
        Err(_) => (String::new(), crate::value::Value::Bytes(key.to_vec())),
    }
}
