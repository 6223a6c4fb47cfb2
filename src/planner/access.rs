//! Access keys
//!
//! A caller-supplied point-lookup descriptor: either a primary-key value or
//! exactly one (secondary index, value) pair.

use super::{Condition, Where};
use crate::error::{IndexKvError, Result};
use crate::keys::PhysicalKey;
use crate::schema::{FieldRole, TableDefinition};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum AccessKey {
    Primary(Value),
    Index { field: String, value: Value },
}

impl AccessKey {
    pub fn primary(value: impl Into<Value>) -> Self {
        AccessKey::Primary(value.into())
    }

    pub fn index(field: impl Into<String>, value: impl Into<Value>) -> Self {
        AccessKey::Index {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Interpret a predicate as an access key
    ///
    /// The predicate must be a single equality on the primary key or on one
    /// secondary index; anything else is `InvalidAccessKey`.
    pub fn from_where(definition: &TableDefinition, filter: &Where) -> Result<Self> {
        let table = definition.name();
        let (field, condition) = match filter.conditions() {
            [] => {
                return Err(IndexKvError::invalid_access_key(
                    table,
                    "neither a primary key nor a secondary index was supplied",
                ))
            }
            [single] => single,
            _ => {
                return Err(IndexKvError::invalid_access_key(
                    table,
                    format!("expected one key field, got {}", filter.len()),
                ))
            }
        };

        let value = match condition {
            Condition::Equals(value) => value.clone(),
            other => {
                return Err(IndexKvError::invalid_access_key(
                    table,
                    format!("`{}` must be matched by equality, got {:?}", field, other),
                ))
            }
        };

        let key = if *field == definition.primary_key().name {
            AccessKey::Primary(value)
        } else {
            AccessKey::Index {
                field: field.clone(),
                value,
            }
        };
        key.resolve(definition)?;
        Ok(key)
    }

    /// The physical key this access key points at
    pub fn resolve(&self, definition: &TableDefinition) -> Result<PhysicalKey> {
        match self {
            AccessKey::Primary(value) => Ok(PhysicalKey::primary(definition, value.clone())),
            AccessKey::Index { field, value } => {
                let def = definition.field(field).ok_or_else(|| {
                    IndexKvError::invalid_access_key(
                        definition.name(),
                        format!("`{}` is not a declared field", field),
                    )
                })?;
                if def.role != FieldRole::Index {
                    return Err(IndexKvError::invalid_access_key(
                        definition.name(),
                        format!("`{}` is not a secondary index", field),
                    ));
                }
                Ok(PhysicalKey::index(definition, field, value.clone()))
            }
        }
    }

    /// Equivalent single-equality predicate
    pub fn to_where(&self, definition: &TableDefinition) -> Where {
        match self {
            AccessKey::Primary(value) => {
                Where::new().equals(definition.primary_key().name.clone(), value.clone())
            }
            AccessKey::Index { field, value } => Where::new().equals(field.clone(), value.clone()),
        }
    }
}
