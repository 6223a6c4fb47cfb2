//! Table definitions
//!
//! Field declarations plus the role each field plays in key derivation.

use serde::{Deserialize, Serialize};

use crate::error::{IndexKvError, Result};
use crate::value::{Entity, Value};

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Bytes,
}

impl FieldType {
    /// Whether values of this type may form a physical key
    ///
    /// Floats are excluded: NaN and -0.0/+0.0 have no stable key identity.
    pub fn is_keyable(self) -> bool {
        !matches!(self, FieldType::Float)
    }

    /// Whether `value` is a valid (non-null) value of this type
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::String, Value::Text(_))
                | (FieldType::Integer, Value::Int(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::Boolean, Value::Bool(_))
                | (FieldType::Bytes, Value::Bytes(_))
        )
    }
}

/// Role of a field in key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// The single field whose value is the record's primary physical key
    Primary,
    /// A unique secondary index: one `{table}_by_{field}` key per record
    Index,
    /// Stored but never part of a key
    Plain,
}

/// A single field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub role: FieldRole,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType, role: FieldRole) -> Self {
        Self {
            name: name.into(),
            field_type,
            role,
        }
    }

    pub fn is_key(&self) -> bool {
        self.role != FieldRole::Plain
    }
}

/// Immutable descriptor of a table
///
/// Fields keep their declaration order; "first declared secondary index" is
/// meaningful to the planner's tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
    fields: Vec<FieldDef>,
    primary: usize,
}

impl TableDefinition {
    /// Validate and build a definition
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(IndexKvError::InvalidDefinition(
                "table name must not be empty".to_string(),
            ));
        }

        let mut primary = None;
        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(IndexKvError::InvalidDefinition(format!(
                    "table `{}` declares a field with an empty name",
                    name
                )));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(IndexKvError::InvalidDefinition(format!(
                    "table `{}` declares field `{}` twice",
                    name, field.name
                )));
            }
            if field.is_key() && !field.field_type.is_keyable() {
                return Err(IndexKvError::InvalidDefinition(format!(
                    "field `{}` of table `{}` has type {:?}, which cannot be a key",
                    field.name, name, field.field_type
                )));
            }
            if field.role == FieldRole::Primary {
                if primary.is_some() {
                    return Err(IndexKvError::InvalidDefinition(format!(
                        "table `{}` declares more than one primary key",
                        name
                    )));
                }
                primary = Some(i);
            }
        }

        let primary = primary.ok_or_else(|| {
            IndexKvError::InvalidDefinition(format!("table `{}` declares no primary key", name))
        })?;

        Ok(Self {
            name,
            fields,
            primary,
        })
    }

    /// Start a builder for table `name`
    pub fn builder(name: impl Into<String>) -> TableDefinitionBuilder {
        TableDefinitionBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> &FieldDef {
        &self.fields[self.primary]
    }

    /// Secondary indexes in declaration order
    pub fn indexes(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.role == FieldRole::Index)
    }

    pub fn index_count(&self) -> usize {
        self.indexes().count()
    }

    /// Check a complete entity before it is written
    ///
    /// Every declared key field must be present and non-null, every present
    /// field must be declared and carry a value of its declared type. Plain
    /// fields may be absent or null.
    pub fn validate_entity(&self, entity: &Entity) -> Result<()> {
        for field in self.fields.iter().filter(|f| f.is_key()) {
            match entity.get(&field.name) {
                None => {
                    return Err(IndexKvError::schema_mismatch(
                        &self.name,
                        &field.name,
                        "key field is missing",
                    ))
                }
                Some(Value::Null) => {
                    return Err(IndexKvError::schema_mismatch(
                        &self.name,
                        &field.name,
                        "key field is null",
                    ))
                }
                Some(_) => {}
            }
        }
        self.validate_patch(entity)
    }

    /// Check a partial entity (update data) against the declared fields
    pub fn validate_patch(&self, patch: &Entity) -> Result<()> {
        for (name, value) in patch.iter() {
            let field = self.field(name).ok_or_else(|| {
                IndexKvError::schema_mismatch(&self.name, name, "field is not declared")
            })?;
            if value.is_null() {
                if field.is_key() {
                    return Err(IndexKvError::schema_mismatch(
                        &self.name,
                        name,
                        "key field is null",
                    ));
                }
                continue;
            }
            if !field.field_type.accepts(value) {
                return Err(IndexKvError::schema_mismatch(
                    &self.name,
                    name,
                    format!(
                        "expected {:?}, got {}",
                        field.field_type,
                        value.kind()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Ensure a predicate or access key only names declared fields
    pub(crate) fn require_field(&self, name: &str) -> Result<&FieldDef> {
        self.field(name).ok_or_else(|| {
            IndexKvError::schema_mismatch(&self.name, name, "field is not declared")
        })
    }
}

/// Builder for TableDefinition
pub struct TableDefinitionBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl TableDefinitionBuilder {
    /// Declare the primary-key field
    pub fn primary_key(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields
            .push(FieldDef::new(name, field_type, FieldRole::Primary));
        self
    }

    /// Declare a unique secondary index field
    pub fn index(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, field_type, FieldRole::Index));
        self
    }

    /// Declare a plain field
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, field_type, FieldRole::Plain));
        self
    }

    pub fn build(self) -> Result<TableDefinition> {
        TableDefinition::new(self.name, self.fields)
    }
}
