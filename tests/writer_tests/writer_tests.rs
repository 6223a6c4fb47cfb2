//! Tests for the Atomic Writer
//!
//! These tests verify:
//! - Create writes the primary key and every index key under one version
//! - Duplicate primary or index values are rejected with nothing written
//! - Update moves changed index keys and checks every old key's version
//! - Delete removes every key of the record
//! - Cross-item batches are all-or-nothing and bounded in size

use std::sync::Arc;

use indexkv::schema::FieldType;
use indexkv::store::Store;
use indexkv::writer::{write_create, write_create_batch, write_delete, write_update};
use indexkv::{
    encode_keys, Entity, IndexKvError, MemoryStore, PhysicalKey, Record, TableDefinition, Value,
    Versionstamp,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn users() -> TableDefinition {
    TableDefinition::builder("users")
        .primary_key("id", FieldType::String)
        .index("email", FieldType::String)
        .field("name", FieldType::String)
        .build()
        .unwrap()
}

fn user(id: &str, email: &str) -> Entity {
    Entity::new().with("id", id).with("email", email).with("name", "n")
}

async fn create(store: &MemoryStore, def: &TableDefinition, entity: Entity) -> Record {
    let keys = encode_keys(def, &entity).unwrap();
    let version = write_create(store, def, &keys, &entity).await.unwrap();
    Record::new(entity, version)
}

async fn version_of(store: &MemoryStore, namespace: &str, value: &str) -> Option<Versionstamp> {
    let key = PhysicalKey::new(namespace, Value::from(value)).encode();
    store.get(&key).await.unwrap().map(|entry| entry.version)
}

async fn entity_at(store: &MemoryStore, namespace: &str, value: &str) -> Option<Entity> {
    let key = PhysicalKey::new(namespace, Value::from(value)).encode();
    store
        .get(&key)
        .await
        .unwrap()
        .map(|entry| Entity::from_bytes(&entry.value).unwrap())
}

// =============================================================================
// Create Tests
// =============================================================================

#[tokio::test]
async fn test_create_sets_all_keys_with_one_version() {
    let store = MemoryStore::new();
    let def = users();

    let record = create(&store, &def, user("1", "a@x.com")).await;

    assert_eq!(store.len(), 2);
    assert_eq!(version_of(&store, "users", "1").await, Some(record.version));
    assert_eq!(
        version_of(&store, "users_by_email", "a@x.com").await,
        Some(record.version)
    );
    assert_eq!(
        entity_at(&store, "users_by_email", "a@x.com").await,
        Some(record.entity)
    );
}

#[tokio::test]
async fn test_create_duplicate_primary() {
    let store = MemoryStore::new();
    let def = users();
    create(&store, &def, user("1", "a@x.com")).await;

    let entity = user("1", "other@x.com");
    let keys = encode_keys(&def, &entity).unwrap();
    let err = write_create(&store, &def, &keys, &entity).await.unwrap_err();

    match err {
        IndexKvError::DuplicateKey { namespace, key, .. } => {
            assert_eq!(namespace, "users");
            assert_eq!(key, Value::from("1"));
        }
        other => panic!("expected DuplicateKey, got {:?}", other),
    }
    assert!(version_of(&store, "users_by_email", "other@x.com").await.is_none());
}

#[tokio::test]
async fn test_create_duplicate_index() {
    let store = MemoryStore::new();
    let def = users();
    create(&store, &def, user("1", "a@x.com")).await;

    let entity = user("2", "a@x.com");
    let keys = encode_keys(&def, &entity).unwrap();
    let err = write_create(&store, &def, &keys, &entity).await.unwrap_err();

    assert!(err.is_duplicate());
    assert!(matches!(
        err,
        IndexKvError::DuplicateKey { ref namespace, .. } if namespace == "users_by_email"
    ));
    // The losing create left no primary key behind
    assert!(version_of(&store, "users", "2").await.is_none());
    assert_eq!(store.len(), 2);
}

// =============================================================================
// Update Tests
// =============================================================================

#[tokio::test]
async fn test_update_moves_changed_index() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    let updated = existing.entity.merged(&Entity::new().with("email", "b@x.com"));
    let version = write_update(&store, &def, &existing, &updated).await.unwrap();

    assert!(version > existing.version);
    assert!(version_of(&store, "users_by_email", "a@x.com").await.is_none());
    assert_eq!(version_of(&store, "users_by_email", "b@x.com").await, Some(version));
    assert_eq!(version_of(&store, "users", "1").await, Some(version));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_update_unchanged_index_shares_new_version() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    let updated = existing.entity.merged(&Entity::new().with("name", "renamed"));
    let version = write_update(&store, &def, &existing, &updated).await.unwrap();

    assert_eq!(version_of(&store, "users_by_email", "a@x.com").await, Some(version));
    let via_index = entity_at(&store, "users_by_email", "a@x.com").await.unwrap();
    assert_eq!(via_index.get("name"), Some(&Value::from("renamed")));
}

#[tokio::test]
async fn test_update_stale_version_conflicts() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    let first = existing.entity.merged(&Entity::new().with("name", "first"));
    write_update(&store, &def, &existing, &first).await.unwrap();

    let second = existing.entity.merged(&Entity::new().with("name", "second"));
    let err = write_update(&store, &def, &existing, &second).await.unwrap_err();

    assert!(err.is_conflict());
    let stored = entity_at(&store, "users", "1").await.unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("first")));
}

#[tokio::test]
async fn test_update_onto_taken_index_is_duplicate() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;
    create(&store, &def, user("2", "b@x.com")).await;

    let updated = existing.entity.merged(&Entity::new().with("email", "b@x.com"));
    let err = write_update(&store, &def, &existing, &updated).await.unwrap_err();

    assert!(matches!(
        err,
        IndexKvError::DuplicateKey { ref namespace, .. } if namespace == "users_by_email"
    ));
    assert_eq!(
        version_of(&store, "users_by_email", "a@x.com").await,
        Some(existing.version)
    );
}

#[tokio::test]
async fn test_update_primary_key_change_rejected() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    let updated = existing.entity.merged(&Entity::new().with("id", "9"));
    let err = write_update(&store, &def, &existing, &updated).await.unwrap_err();

    assert!(matches!(err, IndexKvError::PrimaryKeyChange { .. }));
    assert_eq!(store.last_version(), existing.version);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[tokio::test]
async fn test_delete_removes_every_key() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    write_delete(&store, &def, &existing).await.unwrap();

    assert!(store.is_empty());
}

#[tokio::test]
async fn test_delete_stale_version_conflicts() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;
    let updated = existing.entity.merged(&Entity::new().with("name", "x"));
    write_update(&store, &def, &existing, &updated).await.unwrap();

    let err = write_delete(&store, &def, &existing).await.unwrap_err();

    assert!(matches!(
        err,
        IndexKvError::Conflict { ref namespace, .. } if namespace == "users"
    ));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_delete_after_delete_conflicts() {
    let store = MemoryStore::new();
    let def = users();
    let existing = create(&store, &def, user("1", "a@x.com")).await;

    write_delete(&store, &def, &existing).await.unwrap();
    let err = write_delete(&store, &def, &existing).await.unwrap_err();

    assert!(err.is_conflict());
}

// =============================================================================
// Batch Create Tests
// =============================================================================

fn keyed(def: &TableDefinition, entities: Vec<Entity>) -> Vec<(indexkv::EntityKeys, Entity)> {
    entities
        .into_iter()
        .map(|e| (encode_keys(def, &e).unwrap(), e))
        .collect()
}

#[tokio::test]
async fn test_batch_create_shares_one_version() {
    let store = Arc::new(MemoryStore::new());
    let def = users();
    let items = keyed(&def, vec![user("1", "a@x.com"), user("2", "b@x.com")]);

    let version = write_create_batch(store.as_ref(), &def, &items, 100)
        .await
        .unwrap();

    assert_eq!(store.len(), 4);
    assert_eq!(version_of(&store, "users", "1").await, Some(version));
    assert_eq!(version_of(&store, "users", "2").await, Some(version));
}

#[tokio::test]
async fn test_batch_create_rejects_internal_duplicate() {
    let store = MemoryStore::new();
    let def = users();
    let items = keyed(&def, vec![user("1", "same@x.com"), user("2", "same@x.com")]);

    let err = write_create_batch(&store, &def, &items, 100).await.unwrap_err();

    assert!(err.is_duplicate());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_batch_create_all_or_nothing() {
    let store = MemoryStore::new();
    let def = users();
    create(&store, &def, user("2", "b@x.com")).await;

    let items = keyed(&def, vec![user("1", "a@x.com"), user("2", "c@x.com")]);
    let err = write_create_batch(&store, &def, &items, 100).await.unwrap_err();

    assert!(err.is_duplicate());
    assert!(version_of(&store, "users", "1").await.is_none());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_batch_create_too_large() {
    let store = MemoryStore::new();
    let def = users();
    let items = keyed(&def, vec![user("1", "a@x.com"), user("2", "b@x.com")]);

    let err = write_create_batch(&store, &def, &items, 3).await.unwrap_err();

    assert!(matches!(
        err,
        IndexKvError::BatchTooLarge { keys: 4, limit: 3, .. }
    ));
    assert!(store.is_empty());
}
