//! Query Executor Module
//!
//! The verbs callers use: create, update, delete, find, and their bulk forms.
//! Each verb encodes keys, resolves records through the planner, and commits
//! through the atomic writer. The store handle is injected and shared.
//!
//! ## Singular vs Plural
//! | verb          | empty match set  | acts on                         |
//! |---------------|------------------|---------------------------------|
//! | `update`      | `NoMatch`        | first record in primary-key order |
//! | `update_many` | `UpdateZeroRows` | every resolved record           |
//! | `delete`      | `NoMatch`        | first record in primary-key order |
//! | `delete_many` | `UpdateZeroRows` | every resolved record           |
//!
//! Bulk verbs stop at the first failure. If earlier items were already
//! committed, the failure is wrapped in `PartialBatch` listing them.

use std::sync::Arc;

use crate::config::{BatchMode, Config};
use crate::error::{IndexKvError, Operation, Result};
use crate::keys::encode_keys;
use crate::planner::{self, AccessKey, LookupPlan, Where};
use crate::schema::TableDefinition;
use crate::store::Store;
use crate::value::{Entity, Record};
use crate::writer;

/// Arguments of a resolving verb: which records, and which fields to return
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Where,
    /// Fields kept in returned entities (`None` = all). The primary key is
    /// always kept. Matching always sees the whole entity.
    pub select: Option<Vec<String>>,
    /// Resolve by ordered scan even if an index could serve the filter
    pub force_scan: bool,
}

impl Query {
    pub fn new(filter: Where) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Every record of the table
    pub fn all() -> Self {
        Self::default()
    }

    pub fn select<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn force_scan(mut self) -> Self {
        self.force_scan = true;
        self
    }

    /// The plan this query resolves through
    pub fn plan(&self, definition: &TableDefinition) -> Result<LookupPlan> {
        if self.force_scan {
            planner::plan_scan(definition, &self.filter)
        } else {
            planner::plan(definition, &self.filter)
        }
    }

    fn project(&self, definition: &TableDefinition, record: Record) -> Record {
        match &self.select {
            None => record,
            Some(fields) => {
                let primary = definition.primary_key().name.as_str();
                let entity = record
                    .entity
                    .project(fields.iter().map(String::as_str).chain([primary]));
                Record::new(entity, record.version)
            }
        }
    }
}

impl From<Where> for Query {
    fn from(filter: Where) -> Self {
        Query::new(filter)
    }
}

/// Runs the verbs against a shared store
pub struct QueryExecutor<S: Store + ?Sized> {
    store: Arc<S>,
    config: Config,
}

impl<S: Store + ?Sized> Clone for QueryExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store + ?Sized> QueryExecutor<S> {
    /// Executor with the default config
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: Arc<S>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Insert one entity; `DuplicateKey` if its primary or any index value is taken
    pub async fn create(&self, definition: &TableDefinition, data: Entity) -> Result<Record> {
        definition.validate_entity(&data)?;
        let keys = encode_keys(definition, &data)?;
        tracing::debug!(table = definition.name(), key = %keys.primary, "create");

        let version = writer::write_create(&*self.store, definition, &keys, &data).await?;
        Ok(Record::new(data, version))
    }

    /// Insert several entities using the configured [`BatchMode`]
    pub async fn create_many(
        &self,
        definition: &TableDefinition,
        items: Vec<Entity>,
    ) -> Result<Vec<Record>> {
        self.create_many_with(definition, items, self.config.batch_mode)
            .await
    }

    /// Insert several entities
    ///
    /// `Atomic`: one batch, all or nothing; every record shares one version.
    /// `Sequential`: one batch per item in order; a failure after some items
    /// committed is reported as `PartialBatch`.
    pub async fn create_many_with(
        &self,
        definition: &TableDefinition,
        items: Vec<Entity>,
        mode: BatchMode,
    ) -> Result<Vec<Record>> {
        tracing::debug!(
            table = definition.name(),
            items = items.len(),
            ?mode,
            "create_many"
        );
        if items.is_empty() {
            return Ok(Vec::new());
        }

        match mode {
            BatchMode::Atomic => {
                let mut keyed = Vec::with_capacity(items.len());
                for entity in items {
                    definition.validate_entity(&entity)?;
                    keyed.push((encode_keys(definition, &entity)?, entity));
                }

                let version = writer::write_create_batch(
                    &*self.store,
                    definition,
                    &keyed,
                    self.config.max_atomic_keys,
                )
                .await?;

                Ok(keyed
                    .into_iter()
                    .map(|(_, entity)| Record::new(entity, version))
                    .collect())
            }
            BatchMode::Sequential => {
                let mut applied = Vec::with_capacity(items.len());
                for entity in items {
                    match self.create(definition, entity).await {
                        Ok(record) => applied.push(record),
                        Err(e) => return Err(partial(definition, Operation::Create, applied, e)),
                    }
                }
                Ok(applied)
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Merge `data` into the first matching record
    pub async fn update(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
        data: Entity,
    ) -> Result<Record> {
        let query = query.into();
        definition.validate_patch(&data)?;
        tracing::debug!(table = definition.name(), "update");

        let existing = self
            .resolve(definition, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| no_match(definition, Operation::Update))?;

        let record = self.apply_update(definition, &existing, &data).await?;
        Ok(query.project(definition, record))
    }

    /// Merge `data` into every matching record
    pub async fn update_many(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
        data: Entity,
    ) -> Result<Vec<Record>> {
        let query = query.into();
        definition.validate_patch(&data)?;

        let matched = self.resolve(definition, &query).await?;
        tracing::debug!(table = definition.name(), matched = matched.len(), "update_many");
        if matched.is_empty() {
            return Err(zero_rows(definition, Operation::Update));
        }

        let mut applied = Vec::with_capacity(matched.len());
        for existing in &matched {
            match self.apply_update(definition, existing, &data).await {
                Ok(record) => applied.push(record),
                Err(e) => return Err(partial(definition, Operation::Update, applied, e)),
            }
        }
        Ok(applied
            .into_iter()
            .map(|record| query.project(definition, record))
            .collect())
    }

    async fn apply_update(
        &self,
        definition: &TableDefinition,
        existing: &Record,
        data: &Entity,
    ) -> Result<Record> {
        let merged = existing.entity.merged(data);
        definition.validate_entity(&merged)?;
        let version = writer::write_update(&*self.store, definition, existing, &merged).await?;
        Ok(Record::new(merged, version))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete the first matching record, returning what was deleted
    pub async fn delete(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
    ) -> Result<Record> {
        let query = query.into();
        tracing::debug!(table = definition.name(), "delete");

        let existing = self
            .resolve(definition, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| no_match(definition, Operation::Delete))?;

        writer::write_delete(&*self.store, definition, &existing).await?;
        Ok(query.project(definition, existing))
    }

    /// Delete every matching record, returning what was deleted
    pub async fn delete_many(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
    ) -> Result<Vec<Record>> {
        let query = query.into();

        let matched = self.resolve(definition, &query).await?;
        tracing::debug!(table = definition.name(), matched = matched.len(), "delete_many");
        if matched.is_empty() {
            return Err(zero_rows(definition, Operation::Delete));
        }

        let mut applied = Vec::with_capacity(matched.len());
        for existing in matched {
            if let Err(e) = writer::write_delete(&*self.store, definition, &existing).await {
                return Err(partial(definition, Operation::Delete, applied, e));
            }
            applied.push(existing);
        }
        Ok(applied
            .into_iter()
            .map(|record| query.project(definition, record))
            .collect())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Matching records in primary-key order, possibly none
    pub async fn find_many(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
    ) -> Result<Vec<Record>> {
        let query = query.into();
        let records = self.resolve(definition, &query).await?;
        Ok(records
            .into_iter()
            .map(|record| query.project(definition, record))
            .collect())
    }

    /// First element of what `find_many` returns for the same query
    pub async fn find_first(
        &self,
        definition: &TableDefinition,
        query: impl Into<Query>,
    ) -> Result<Option<Record>> {
        Ok(self.find_many(definition, query).await?.into_iter().next())
    }

    /// Point read by primary key or one secondary index
    pub async fn find_unique(
        &self,
        definition: &TableDefinition,
        key: &AccessKey,
    ) -> Result<Option<Record>> {
        let plan = LookupPlan::DirectLookup {
            key: key.resolve(definition)?,
            residual: Where::all(),
        };
        Ok(planner::execute(&plan, &*self.store).await?.into_iter().next())
    }

    async fn resolve(&self, definition: &TableDefinition, query: &Query) -> Result<Vec<Record>> {
        let plan = query.plan(definition)?;
        let records = planner::execute(&plan, &*self.store).await?;
        tracing::trace!(
            table = definition.name(),
            direct = plan.is_direct(),
            matched = records.len(),
            "resolved"
        );
        Ok(records)
    }
}

fn no_match(definition: &TableDefinition, operation: Operation) -> IndexKvError {
    IndexKvError::NoMatch {
        table: definition.name().to_string(),
        operation,
    }
}

fn zero_rows(definition: &TableDefinition, operation: Operation) -> IndexKvError {
    IndexKvError::UpdateZeroRows {
        table: definition.name().to_string(),
        operation,
    }
}

/// Wrap a bulk failure with the items committed before it (bare if none were)
fn partial(
    definition: &TableDefinition,
    operation: Operation,
    applied: Vec<Record>,
    source: IndexKvError,
) -> IndexKvError {
    if applied.is_empty() {
        return source;
    }
    tracing::warn!(
        table = definition.name(),
        %operation,
        applied = applied.len(),
        error = %source,
        "bulk operation stopped part-way"
    );
    IndexKvError::PartialBatch {
        table: definition.name().to_string(),
        operation,
        applied,
        source: Box::new(source),
    }
}
