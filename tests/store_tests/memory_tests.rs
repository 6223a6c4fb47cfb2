//! Tests for MemoryStore
//!
//! These tests verify:
//! - get/list semantics and ascending key order
//! - Prefix listing stays inside its prefix
//! - atomic_apply: all checks pass or nothing is applied
//! - Versionstamps are strictly increasing and shared within a batch
//! - Concurrent readers and writers

use std::sync::Arc;

use bytes::Bytes;
use indexkv::store::{AtomicBatch, Check, CommitOutcome, MemoryStore, Store, Versionstamp};

// =============================================================================
// Helper Functions
// =============================================================================

fn b(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

async fn set(store: &MemoryStore, key: &str, value: &str) -> Versionstamp {
    let mut batch = AtomicBatch::new();
    batch.set(b(key), b(value));
    match store.atomic_apply(batch).await.unwrap() {
        CommitOutcome::Committed(version) => version,
        other => panic!("unexpected {:?}", other),
    }
}

// =============================================================================
// Basic Operation Tests
// =============================================================================

#[tokio::test]
async fn test_get_missing() {
    let store = MemoryStore::new();
    assert!(store.get(b"missing").await.unwrap().is_none());
    assert!(store.is_empty());
    assert_eq!(store.last_version(), Versionstamp::ZERO);
}

#[tokio::test]
async fn test_default_store_starts_at_zero_version() {
    assert_eq!(Versionstamp::default(), Versionstamp::ZERO);

    let store = MemoryStore::default();
    assert_eq!(store.last_version(), Versionstamp::ZERO);

    let version = set(&store, "k", "v").await;
    assert!(version > Versionstamp::default());
}

#[tokio::test]
async fn test_set_then_get() {
    let store = MemoryStore::new();
    let version = set(&store, "k", "v").await;

    let entry = store.get(b"k").await.unwrap().unwrap();
    assert_eq!(entry.key, b("k"));
    assert_eq!(entry.value, b("v"));
    assert_eq!(entry.version, version);
    assert!(version > Versionstamp::ZERO);
}

#[tokio::test]
async fn test_versions_strictly_increase() {
    let store = MemoryStore::new();
    let v1 = set(&store, "a", "1").await;
    let v2 = set(&store, "a", "2").await;
    let v3 = set(&store, "b", "3").await;

    assert!(v1 < v2 && v2 < v3);
    assert_eq!(store.last_version(), v3);
}

#[tokio::test]
async fn test_list_is_ordered_and_bounded() {
    let store = MemoryStore::new();
    for key in ["p/c", "p/a", "q/a", "p/b", "o/z"] {
        set(&store, key, "v").await;
    }

    let keys: Vec<Bytes> = store
        .list_all(b"p/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();

    assert_eq!(keys, vec![b("p/a"), b("p/b"), b("p/c")]);
}

#[tokio::test]
async fn test_list_iterator_outlives_writes() {
    let store = MemoryStore::new();
    set(&store, "p/a", "1").await;

    let mut iter = store.list(b"p/").await.unwrap();
    set(&store, "p/b", "2").await;

    let first = iter.next().await.unwrap().unwrap();
    assert_eq!(first.key, b("p/a"));
    assert!(iter.next().await.unwrap().is_none());
}

// =============================================================================
// Atomic Batch Tests
// =============================================================================

#[tokio::test]
async fn test_batch_shares_one_version() {
    let store = MemoryStore::new();
    let mut batch = AtomicBatch::new();
    batch
        .check(Check::absent(b("x")))
        .check(Check::absent(b("y")))
        .set(b("x"), b("1"))
        .set(b("y"), b("2"));

    let outcome = store.atomic_apply(batch).await.unwrap();
    let version = match outcome {
        CommitOutcome::Committed(version) => version,
        other => panic!("unexpected {:?}", other),
    };

    assert_eq!(store.get(b"x").await.unwrap().unwrap().version, version);
    assert_eq!(store.get(b"y").await.unwrap().unwrap().version, version);
}

#[tokio::test]
async fn test_failed_check_applies_nothing() {
    let store = MemoryStore::new();
    set(&store, "taken", "v").await;
    let before = store.last_version();

    let mut batch = AtomicBatch::new();
    batch
        .check(Check::absent(b("free")))
        .check(Check::absent(b("taken")))
        .set(b("free"), b("1"))
        .set(b("taken"), b("2"));

    let outcome = store.atomic_apply(batch).await.unwrap();

    assert_eq!(outcome, CommitOutcome::Conflict { key: b("taken") });
    assert!(store.get(b"free").await.unwrap().is_none());
    assert_eq!(store.get(b"taken").await.unwrap().unwrap().value, b("v"));
    assert_eq!(store.last_version(), before);
}

#[tokio::test]
async fn test_conflict_reports_first_failing_check() {
    let store = MemoryStore::new();
    set(&store, "a", "1").await;
    set(&store, "b", "1").await;

    let mut batch = AtomicBatch::new();
    batch
        .check(Check::absent(b("b")))
        .check(Check::absent(b("a")));

    let outcome = store.atomic_apply(batch).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Conflict { key: b("b") });
}

#[tokio::test]
async fn test_version_check() {
    let store = MemoryStore::new();
    let v1 = set(&store, "k", "1").await;

    let mut stale = AtomicBatch::new();
    stale.check(Check::version(b("k"), Versionstamp::new(v1.as_u64() + 10)));
    stale.delete(b("k"));
    assert!(matches!(
        store.atomic_apply(stale).await.unwrap(),
        CommitOutcome::Conflict { .. }
    ));

    let mut current = AtomicBatch::new();
    current.check(Check::version(b("k"), v1));
    current.delete(b("k"));
    assert!(matches!(
        store.atomic_apply(current).await.unwrap(),
        CommitOutcome::Committed(_)
    ));
    assert!(store.get(b"k").await.unwrap().is_none());

    // A deleted key fails a version check
    let mut gone = AtomicBatch::new();
    gone.check(Check::version(b("k"), v1));
    assert!(matches!(
        store.atomic_apply(gone).await.unwrap(),
        CommitOutcome::Conflict { .. }
    ));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_of_same_key() {
    let store = Arc::new(MemoryStore::new());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut batch = AtomicBatch::new();
            batch
                .check(Check::absent(b("unique")))
                .set(b("unique"), b(&i.to_string()));
            store.atomic_apply(batch).await.unwrap()
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if let CommitOutcome::Committed(_) = handle.await.unwrap() {
            committed += 1;
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_writes() {
    let store = Arc::new(MemoryStore::new());

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let key = format!("k{:02}", i);
            let mut batch = AtomicBatch::new();
            batch.set(b(&key), b("v"));
            store.atomic_apply(batch).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), CommitOutcome::Committed(_)));
    }

    assert_eq!(store.len(), 32);
    assert_eq!(store.last_version(), Versionstamp::new(32));
}
