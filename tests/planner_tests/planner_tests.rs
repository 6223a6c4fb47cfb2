//! Tests for the Index Planner
//!
//! These tests verify:
//! - DirectLookup is chosen only for equality on key fields
//! - The anchor tie-break (primary key, then first declared index)
//! - Undeclared fields are rejected
//! - Execution returns records in primary-key order
//! - DirectLookup and a forced scan return the same records

use std::sync::Arc;

use indexkv::planner::{self, plan, plan_scan, Condition, LookupPlan};
use indexkv::schema::FieldType;
use indexkv::{
    Entity, IndexKvError, MemoryStore, PhysicalKey, QueryExecutor, TableDefinition, Value, Where,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn users() -> TableDefinition {
    TableDefinition::builder("users")
        .primary_key("id", FieldType::String)
        .index("email", FieldType::String)
        .index("username", FieldType::String)
        .field("age", FieldType::Integer)
        .build()
        .unwrap()
}

fn user(id: &str, email: &str, username: &str, age: i64) -> Entity {
    Entity::new()
        .with("id", id)
        .with("email", email)
        .with("username", username)
        .with("age", age)
}

async fn seeded() -> (Arc<MemoryStore>, TableDefinition) {
    let store = Arc::new(MemoryStore::new());
    let def = users();
    let executor = QueryExecutor::new(Arc::clone(&store));

    // Inserted out of primary-key order on purpose
    for entity in [
        user("3", "c@x.com", "carol", 41),
        user("1", "a@x.com", "alice", 30),
        user("2", "b@x.com", "bob", 25),
    ] {
        executor.create(&def, entity).await.unwrap();
    }
    (store, def)
}

fn anchor(plan: &LookupPlan) -> &PhysicalKey {
    match plan {
        LookupPlan::DirectLookup { key, .. } => key,
        other => panic!("expected DirectLookup, got {:?}", other),
    }
}

fn ids(records: &[indexkv::Record]) -> Vec<Value> {
    records.iter().map(|r| r.get("id").unwrap().clone()).collect()
}

// =============================================================================
// Plan Selection Tests
// =============================================================================

#[test]
fn test_primary_equality_is_direct() {
    let plan = plan(&users(), &Where::new().equals("id", "1")).unwrap();

    assert!(plan.is_direct());
    assert_eq!(anchor(&plan), &PhysicalKey::new("users", Value::from("1")));
}

#[test]
fn test_index_equality_is_direct() {
    let plan = plan(&users(), &Where::new().equals("email", "a@x.com")).unwrap();

    assert_eq!(
        anchor(&plan),
        &PhysicalKey::new("users_by_email", Value::from("a@x.com"))
    );
}

#[test]
fn test_empty_where_scans() {
    let plan = plan(&users(), &Where::all()).unwrap();
    assert!(matches!(plan, LookupPlan::ScanAndFilter { .. }));
}

#[test]
fn test_plain_field_scans() {
    let plan = plan(&users(), &Where::new().equals("age", 30)).unwrap();
    assert!(!plan.is_direct());
}

#[test]
fn test_non_equality_on_index_scans() {
    let not_equal = plan(&users(), &Where::new().not_equals("email", "a@x.com")).unwrap();
    assert!(!not_equal.is_direct());

    let membership = plan(&users(), &Where::new().is_in("id", ["1", "2"])).unwrap();
    assert!(!membership.is_direct());
}

#[test]
fn test_mixed_key_and_plain_scans() {
    let filter = Where::new().equals("email", "a@x.com").equals("age", 30);
    let plan = plan(&users(), &filter).unwrap();
    assert!(!plan.is_direct());
}

#[test]
fn test_primary_wins_tie_break() {
    let filter = Where::new().equals("email", "a@x.com").equals("id", "1");
    let plan = plan(&users(), &filter).unwrap();

    assert_eq!(anchor(&plan).namespace, "users");
    match plan {
        LookupPlan::DirectLookup { residual, .. } => {
            assert_eq!(residual.conditions().len(), 1);
            assert_eq!(residual.conditions()[0].0, "email");
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_first_declared_index_wins_tie_break() {
    // username is listed first but email is declared first
    let filter = Where::new()
        .equals("username", "alice")
        .equals("email", "a@x.com");
    let plan = plan(&users(), &filter).unwrap();

    assert_eq!(anchor(&plan).namespace, "users_by_email");
}

#[test]
fn test_undeclared_field_is_schema_mismatch() {
    let err = plan(&users(), &Where::new().equals("nickname", "al")).unwrap_err();
    assert!(matches!(
        err,
        IndexKvError::SchemaMismatch { ref field, .. } if field == "nickname"
    ));

    let err = plan_scan(&users(), &Where::new().gt("height", 3)).unwrap_err();
    assert!(matches!(err, IndexKvError::SchemaMismatch { .. }));
}

#[test]
fn test_plan_scan_never_direct() {
    let plan = plan_scan(&users(), &Where::new().equals("id", "1")).unwrap();
    match plan {
        LookupPlan::ScanAndFilter { prefix, predicate } => {
            assert_eq!(prefix, PhysicalKey::prefix("users"));
            assert_eq!(
                predicate.conditions()[0].1,
                Condition::Equals(Value::from("1"))
            );
        }
        other => panic!("expected ScanAndFilter, got {:?}", other),
    }
}

// =============================================================================
// Execution Tests
// =============================================================================

#[tokio::test]
async fn test_scan_returns_primary_key_order() {
    let (store, def) = seeded().await;

    let plan = plan(&def, &Where::all()).unwrap();
    let records = planner::execute(&plan, store.as_ref()).await.unwrap();

    assert_eq!(ids(&records), vec![Value::from("1"), Value::from("2"), Value::from("3")]);
}

#[tokio::test]
async fn test_scan_filters_with_ranges() {
    let (store, def) = seeded().await;

    let filter = Where::new().gte("age", 26).lt("age", 41);
    let records = planner::execute(&plan(&def, &filter).unwrap(), store.as_ref())
        .await
        .unwrap();

    assert_eq!(ids(&records), vec![Value::from("1")]);
}

#[tokio::test]
async fn test_direct_lookup_miss_is_empty() {
    let (store, def) = seeded().await;

    let plan = plan(&def, &Where::new().equals("email", "nobody@x.com")).unwrap();
    let records = planner::execute(&plan, store.as_ref()).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_direct_lookup_applies_residual() {
    let (store, def) = seeded().await;

    let hit = Where::new().equals("id", "2").equals("email", "b@x.com");
    let miss = Where::new().equals("id", "2").equals("email", "a@x.com");

    let records = planner::execute(&plan(&def, &hit).unwrap(), store.as_ref())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let records = planner::execute(&plan(&def, &miss).unwrap(), store.as_ref())
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_direct_and_scan_agree() {
    let (store, def) = seeded().await;

    let filters = vec![
        Where::new().equals("id", "1"),
        Where::new().equals("id", "9"),
        Where::new().equals("email", "b@x.com"),
        Where::new().equals("username", "carol"),
        Where::new().equals("username", "carol").equals("email", "c@x.com"),
        Where::new().equals("username", "carol").equals("email", "a@x.com"),
    ];

    for filter in filters {
        let direct = plan(&def, &filter).unwrap();
        assert!(direct.is_direct());
        let scan = plan_scan(&def, &filter).unwrap();

        let via_index = planner::execute(&direct, store.as_ref()).await.unwrap();
        let via_scan = planner::execute(&scan, store.as_ref()).await.unwrap();
        assert_eq!(via_index, via_scan, "filter {:?}", filter);
    }
}
