//! Schema Module
//!
//! Closed, explicitly tagged table descriptions.
//!
//! ## Responsibilities
//! - Describe each field by name, type and role (primary / index / plain)
//! - Reject definitions without exactly one primary key
//! - Type-check entities and update patches against the declared fields
//! - Parse the JSON definition format
//!
//! A [`TableDefinition`] is built once at setup and only read afterwards.

mod definition;
mod json;

pub use definition::{FieldDef, FieldRole, FieldType, TableDefinition, TableDefinitionBuilder};
