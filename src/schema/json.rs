//! JSON table definition format
//!
//! ```text
//! {
//!   "id":    { "type": "string", "isPrimaryKey": true },
//!   "email": { "type": "string", "isIndex": true },
//!   "owner": { "type": "string", "relation": { ... } }
//! }
//! ```
//!
//! Object order is declaration order. `relation` is accepted and ignored.

use serde::Deserialize;

use super::{FieldDef, FieldRole, FieldType, TableDefinition};
use crate::error::{IndexKvError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldSpec {
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    is_primary_key: bool,
    #[serde(default)]
    is_index: bool,
}

impl TableDefinition {
    /// Parse a definition from its JSON description
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let name = name.into();
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| IndexKvError::InvalidDefinition(format!("table `{}`: {}", name, e)))?;

        let mut fields = Vec::with_capacity(raw.len());
        for (field_name, spec) in raw {
            let spec: FieldSpec = serde_json::from_value(spec).map_err(|e| {
                IndexKvError::InvalidDefinition(format!(
                    "table `{}`, field `{}`: {}",
                    name, field_name, e
                ))
            })?;

            let role = match (spec.is_primary_key, spec.is_index) {
                (true, true) => {
                    return Err(IndexKvError::InvalidDefinition(format!(
                        "field `{}` of table `{}` is both primary key and index",
                        field_name, name
                    )))
                }
                (true, false) => FieldRole::Primary,
                (false, true) => FieldRole::Index,
                (false, false) => FieldRole::Plain,
            };
            fields.push(FieldDef::new(field_name, spec.field_type, role));
        }

        TableDefinition::new(name, fields)
    }
}
