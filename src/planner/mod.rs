//! Index Planner Module
//!
//! Decides how a predicate is served and runs the resulting plan.
//!
//! ## Plans
//! - `DirectLookup`: every constrained field is the primary key or a
//!   secondary index, each constrained by equality. One point read of the
//!   anchor key; remaining conditions are checked on the fetched record.
//! - `ScanAndFilter`: anything else (empty predicate, plain fields, non-equality
//!   conditions). Ordered scan of the primary space, then filtering.
//!
//! ## Anchor Tie-Break
//! Primary key first, else the first *declared* secondary index the predicate
//! constrains. Deterministic regardless of predicate order.
//!
//! Both plans yield records in primary-key order; `find_first` relies on it.

mod access;
mod predicate;

use bytes::Bytes;

use crate::error::Result;
use crate::keys::PhysicalKey;
use crate::schema::{FieldRole, TableDefinition};
use crate::store::Store;
use crate::value::{Entity, Record};

pub use access::AccessKey;
pub use predicate::{Condition, Where};

/// How a predicate will be resolved
#[derive(Debug, Clone, PartialEq)]
pub enum LookupPlan {
    /// One point read, then `residual` checked on the result
    DirectLookup { key: PhysicalKey, residual: Where },

    /// Ordered scan of every key under `prefix`, keeping records that match
    ScanAndFilter { prefix: Bytes, predicate: Where },
}

impl LookupPlan {
    pub fn is_direct(&self) -> bool {
        matches!(self, LookupPlan::DirectLookup { .. })
    }
}

/// Choose a plan for `filter`
///
/// Fails with `SchemaMismatch` if the predicate names an undeclared field.
pub fn plan(definition: &TableDefinition, filter: &Where) -> Result<LookupPlan> {
    for (field, _) in filter.conditions() {
        definition.require_field(field)?;
    }

    let indexable = !filter.is_empty()
        && filter.conditions().iter().all(|(field, condition)| {
            condition.is_equality()
                && definition
                    .field(field)
                    .map(|f| f.role != FieldRole::Plain)
                    .unwrap_or(false)
        });

    if !indexable {
        return plan_scan(definition, filter);
    }

    let primary = &definition.primary_key().name;
    let anchor = position_of(filter, primary).or_else(|| {
        definition
            .indexes()
            .find_map(|index| position_of(filter, &index.name))
    });

    match anchor {
        Some(i) => {
            let (field, condition) = &filter.conditions()[i];
            let value = match condition {
                Condition::Equals(value) => value.clone(),
                _ => return plan_scan(definition, filter),
            };
            let key = if field == primary {
                PhysicalKey::primary(definition, value)
            } else {
                PhysicalKey::index(definition, field, value)
            };
            tracing::trace!(table = definition.name(), anchor = %key, "direct lookup");
            Ok(LookupPlan::DirectLookup {
                key,
                residual: filter.without(i),
            })
        }
        None => plan_scan(definition, filter),
    }
}

/// The scan plan for `filter`, whatever indexes it could use
pub fn plan_scan(definition: &TableDefinition, filter: &Where) -> Result<LookupPlan> {
    for (field, _) in filter.conditions() {
        definition.require_field(field)?;
    }
    tracing::trace!(
        table = definition.name(),
        conditions = filter.len(),
        "scan and filter"
    );
    Ok(LookupPlan::ScanAndFilter {
        prefix: PhysicalKey::prefix(definition.name()),
        predicate: filter.clone(),
    })
}

/// Run a plan, returning matching records in primary-key order
pub async fn execute<S>(plan: &LookupPlan, store: &S) -> Result<Vec<Record>>
where
    S: Store + ?Sized,
{
    match plan {
        LookupPlan::DirectLookup { key, residual } => {
            let entry = match store.get(&key.encode()).await? {
                Some(entry) => entry,
                None => return Ok(Vec::new()),
            };
            let entity = Entity::from_bytes(&entry.value)?;
            if residual.matches(&entity) {
                Ok(vec![Record::new(entity, entry.version)])
            } else {
                Ok(Vec::new())
            }
        }
        LookupPlan::ScanAndFilter { prefix, predicate } => {
            let mut iter = store.list(prefix).await?;
            let mut records = Vec::new();
            while let Some(entry) = iter.next().await? {
                let entity = Entity::from_bytes(&entry.value)?;
                if predicate.matches(&entity) {
                    records.push(Record::new(entity, entry.version));
                }
            }
            Ok(records)
        }
    }
}

fn position_of(filter: &Where, field: &str) -> Option<usize> {
    filter.conditions().iter().position(|(f, _)| f == field)
}
