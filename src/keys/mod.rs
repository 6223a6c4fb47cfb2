//! Key Encoder Module
//!
//! Maps (table definition, entity) to the physical keys that represent it.
//!
//! ## Key Spaces
//! ```text
//! users                 id    → entity     (primary space)
//! users_by_email        email → entity     (one space per secondary index)
//! users_by_username     username → entity
//! ```
//!
//! Every entity owns exactly one key in the primary space and one key in
//! each index space. All of them are written and removed together.

mod encoding;

use std::fmt;

use bytes::Bytes;

use crate::error::{IndexKvError, Result};
use crate::schema::TableDefinition;
use crate::value::{Entity, Value};

pub use encoding::{decode_key, encode_key, encode_namespace};

/// An ordered `(namespace, value)` tuple
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalKey {
    pub namespace: String,
    pub value: Value,
}

impl PhysicalKey {
    pub fn new(namespace: impl Into<String>, value: Value) -> Self {
        Self {
            namespace: namespace.into(),
            value,
        }
    }

    /// Key in the table's primary space
    pub fn primary(definition: &TableDefinition, value: Value) -> Self {
        Self::new(definition.name(), value)
    }

    /// Key in the `{table}_by_{field}` index space
    pub fn index(definition: &TableDefinition, field: &str, value: Value) -> Self {
        Self::new(index_namespace(definition.name(), field), value)
    }

    /// Order-preserving byte form handed to the store
    pub fn encode(&self) -> Bytes {
        encode_key(&self.namespace, &self.value)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (namespace, value) = decode_key(bytes)?;
        Ok(Self { namespace, value })
    }

    /// `list` prefix covering every key of a namespace
    pub fn prefix(namespace: &str) -> Bytes {
        encode_namespace(namespace)
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.namespace, self.value)
    }
}

/// Namespace of the secondary index on `field`
pub fn index_namespace(table: &str, field: &str) -> String {
    format!("{}_by_{}", table, field)
}

/// One secondary-index key of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey {
    pub field: String,
    pub key: PhysicalKey,
}

/// The complete key set of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKeys {
    pub primary: PhysicalKey,
    /// In index declaration order
    pub indexes: Vec<IndexKey>,
}

impl EntityKeys {
    pub fn index(&self, field: &str) -> Option<&PhysicalKey> {
        self.indexes
            .iter()
            .find(|i| i.field == field)
            .map(|i| &i.key)
    }

    /// Primary key first, then index keys in declaration order
    pub fn all(&self) -> impl Iterator<Item = &PhysicalKey> {
        std::iter::once(&self.primary).chain(self.indexes.iter().map(|i| &i.key))
    }

    pub fn key_count(&self) -> usize {
        1 + self.indexes.len()
    }
}

/// Derive the primary key and every index key of `entity`
///
/// Pure. Fails with `SchemaMismatch` when the primary-key field or a declared
/// index field is absent (or null).
pub fn encode_keys(definition: &TableDefinition, entity: &Entity) -> Result<EntityKeys> {
    let primary_field = &definition.primary_key().name;
    let primary = PhysicalKey::primary(definition, key_value(definition, entity, primary_field)?);

    let indexes = definition
        .indexes()
        .map(|field| {
            let value = key_value(definition, entity, &field.name)?;
            Ok(IndexKey {
                field: field.name.clone(),
                key: PhysicalKey::index(definition, &field.name, value),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EntityKeys { primary, indexes })
}

fn key_value(definition: &TableDefinition, entity: &Entity, field: &str) -> Result<Value> {
    match entity.get(field) {
        Some(Value::Null) | None => Err(IndexKvError::schema_mismatch(
            definition.name(),
            field,
            "key field is missing",
        )),
        Some(value) => Ok(value.clone()),
    }
}
