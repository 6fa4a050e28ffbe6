//! Metadata-driven persistence facade
//!
//! Ties the compiler, decoder, converter and executor together behind
//! entity-level operations: fetch/count on query specifications, CRUD by
//! primary key, and junction link management. Statements are built from
//! the same schema metadata the compiler uses, so every parameter ships
//! with a typed marker.

mod executor;

pub use executor::{ExecutionError, StatementExecutor};

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::data_converter::{scalar_bind_value, ConvertError, DataConverter};
use crate::entity_catalog::{CatalogError, EntityCatalog, EntityInformation, PropertyInformation};
use crate::query_compiler::{CompileError, CompilerOptions, QueryCompiler};
use crate::query_spec::QuerySpecification;
use crate::row_decoder::{DecodeError, RowDecoder};
use crate::schema_metadata::{SchemaError, SchemaInfo, SchemaMetadataResolver};
use crate::value::SqlValue;

/// Errors raised by the storage facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    Invalid(String),
}

impl StorageError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StorageError::Invalid(message.into())
    }
}

type ColumnGroup = ((String, String), Vec<(String, SqlValue)>);

/// Entity-level data access over one catalog, resolver and executor.
pub struct DataStorage {
    catalog: Arc<EntityCatalog>,
    resolver: Arc<SchemaMetadataResolver>,
    converter: Arc<dyn DataConverter>,
    executor: Arc<dyn StatementExecutor>,
    compiler: QueryCompiler,
    decoder: RowDecoder,
}

impl DataStorage {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        resolver: Arc<SchemaMetadataResolver>,
        converter: Arc<dyn DataConverter>,
        executor: Arc<dyn StatementExecutor>,
    ) -> Self {
        DataStorage::with_options(
            catalog,
            resolver,
            converter,
            executor,
            CompilerOptions::default(),
        )
    }

    pub fn with_options(
        catalog: Arc<EntityCatalog>,
        resolver: Arc<SchemaMetadataResolver>,
        converter: Arc<dyn DataConverter>,
        executor: Arc<dyn StatementExecutor>,
        options: CompilerOptions,
    ) -> Self {
        let compiler = QueryCompiler::with_options(catalog.clone(), resolver.clone(), options);
        let decoder = RowDecoder::new(catalog.clone(), resolver.clone(), converter.clone());
        DataStorage {
            catalog,
            resolver,
            converter,
            executor,
            compiler,
            decoder,
        }
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// Compiles, executes and decodes a read query.
    pub fn fetch(&self, spec: &QuerySpecification) -> Result<Vec<Value>, StorageError> {
        let compiled = self.compiler.compile(spec)?;
        let rows = self
            .executor
            .fetch_rows(&compiled.text, &compiled.parameters)?;
        Ok(self
            .decoder
            .decode_rows(&spec.entity, &compiled.column_aliases, &rows)?)
    }

    /// Counts the rows a specification would match.
    pub fn count(&self, spec: &QuerySpecification) -> Result<u64, StorageError> {
        let mut counting = spec.clone();
        counting.count = true;
        let compiled = self.compiler.compile(&counting)?;
        let rows = self
            .executor
            .fetch_rows(&compiled.text, &compiled.parameters)?;
        rows.first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_u64)
            .ok_or_else(|| StorageError::invalid("count query returned no scalar"))
    }

    /// Inserts one entity row, split across its repositories. Returns the
    /// generated key when the primary key is auto-increment and the
    /// database produced one. Multi-table writes run inside a transaction
    /// when every repository supports one.
    pub fn insert(
        &self,
        entity_name: &str,
        attributes: &Map<String, Value>,
    ) -> Result<Option<u64>, StorageError> {
        let entity = self.catalog.entity(entity_name)?;
        let schema = self.resolver.resolve(&self.catalog, entity)?;
        let main = (
            self.catalog.storage_for_entity(entity).to_owned(),
            entity.repository.clone(),
        );
        let mut groups = self.group_attributes(entity, &schema, attributes, false)?;
        if groups.is_empty() {
            return Err(StorageError::invalid(format!(
                "no persistable attributes provided for '{entity_name}'"
            )));
        }
        groups.sort_by_key(|(pair, _)| pair != &main);
        if groups.first().map(|(pair, _)| pair) != Some(&main) {
            // all attributes live in side tables; the main row still has
            // to exist to anchor them
            groups.insert(0, (main, Vec::new()));
        }

        let transactional = groups.len() > 1 && schema.transaction_enabled;
        if transactional {
            self.executor.begin()?;
        }
        match self.insert_groups(entity, &schema, &groups) {
            Ok(generated) => {
                if transactional {
                    self.executor.commit()?;
                }
                Ok(generated)
            }
            Err(err) => {
                if transactional {
                    if let Err(rollback) = self.executor.rollback() {
                        log::error!("Rollback failed after insert error: {rollback}");
                    }
                }
                Err(err)
            }
        }
    }

    fn insert_groups(
        &self,
        entity: &EntityInformation,
        schema: &SchemaInfo,
        groups: &[ColumnGroup],
    ) -> Result<Option<u64>, StorageError> {
        let pk = entity.primary_key()?;
        let provided_pk = groups
            .first()
            .and_then(|(_, columns)| columns.iter().find(|(column, _)| column == &pk.column))
            .map(|(_, value)| value.clone());
        let mut generated: Option<u64> = None;

        for (index, ((storage, repository), columns)) in groups.iter().enumerate() {
            let mut columns = columns.clone();
            if index > 0 && !columns.iter().any(|(column, _)| column == &pk.column) {
                let link = match (&provided_pk, generated) {
                    (Some(value), _) => value.clone(),
                    (None, Some(id)) => SqlValue::UInt(id),
                    (None, None) => {
                        return Err(StorageError::invalid(format!(
                            "no primary key value available to link '{storage}.{repository}'"
                        )))
                    }
                };
                columns.insert(0, (pk.column.clone(), link));
            }
            let (text, parameters) = insert_statement(schema, storage, repository, &columns)?;
            self.executor.execute(&text, &parameters)?;
            if index == 0 && pk.auto_increment && provided_pk.is_none() {
                generated = self.executor.last_insert_id()?;
            }
        }
        Ok(generated)
    }

    /// Updates one entity row across its repositories. A repository whose
    /// UPDATE touches nothing gets an existence check, a key-only INSERT
    /// when the row is missing, and the UPDATE again.
    pub fn update(
        &self,
        entity_name: &str,
        pk_value: &Value,
        attributes: &Map<String, Value>,
    ) -> Result<(), StorageError> {
        let entity = self.catalog.entity(entity_name)?;
        let schema = self.resolver.resolve(&self.catalog, entity)?;
        let pk = entity.primary_key()?;
        let bound_pk = self.import_value(&schema, entity, pk, pk_value)?;
        let groups = self.group_attributes(entity, &schema, attributes, true)?;

        for ((storage, repository), columns) in &groups {
            let pk_marker = placeholder_marker(&schema, storage, repository, &pk.column)?;
            let mut assignments = Vec::with_capacity(columns.len());
            let mut parameters = Vec::with_capacity(columns.len() + 1);
            for (column, value) in columns {
                let marker = placeholder_marker(&schema, storage, repository, column)?;
                assignments.push(format!("[{column}] = {marker}"));
                parameters.push(value.clone());
            }
            parameters.push(bound_pk.clone());
            let text = format!(
                "UPDATE [{storage}].[{repository}] SET {} WHERE [{}] = {pk_marker}",
                assignments.join(", "),
                pk.column
            );
            let affected = self.executor.execute(&text, &parameters)?;
            if affected == 0 {
                let probe = format!(
                    "SELECT COUNT([{}]) FROM [{storage}].[{repository}] WHERE [{}] = {pk_marker}",
                    pk.column, pk.column
                );
                let rows = self
                    .executor
                    .fetch_rows(&probe, std::slice::from_ref(&bound_pk))?;
                let present = rows
                    .first()
                    .and_then(|row| row.values().next())
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                if present == 0 {
                    let seed = format!(
                        "INSERT INTO [{storage}].[{repository}] ([{}]) VALUES ({pk_marker})",
                        pk.column
                    );
                    self.executor
                        .execute(&seed, std::slice::from_ref(&bound_pk))?;
                    self.executor.execute(&text, &parameters)?;
                }
            }
        }
        Ok(())
    }

    /// Deletes one entity row from every repository it spans.
    pub fn remove(&self, entity_name: &str, pk_value: &Value) -> Result<(), StorageError> {
        let entity = self.catalog.entity(entity_name)?;
        let schema = self.resolver.resolve(&self.catalog, entity)?;
        let pk = entity.primary_key()?;
        let bound = self.import_value(&schema, entity, pk, pk_value)?;
        for repository in &schema.repositories {
            let marker = placeholder_marker(
                &schema,
                &repository.storage,
                &repository.repository,
                &pk.column,
            )?;
            let text = format!(
                "DELETE FROM [{}].[{}] WHERE [{}] = {marker} LIMIT 1",
                repository.storage, repository.repository, pk.column
            );
            self.executor.execute(&text, std::slice::from_ref(&bound))?;
        }
        Ok(())
    }

    /// Links two rows through a junction table whose columns are named
    /// after the linked repositories.
    pub fn create_link(
        &self,
        junction_repository: &str,
        owner: (&str, &Value),
        target: (&str, &Value),
    ) -> Result<(), StorageError> {
        let link = self.link_parts(junction_repository, owner, target)?;
        let text = format!(
            "INSERT INTO [{}].[{}] ([{}], [{}]) VALUES ({}, {})",
            link.storage,
            link.repository,
            link.owner_column,
            link.target_column,
            link.owner_marker,
            link.target_marker
        );
        self.executor
            .execute(&text, &[link.owner_value, link.target_value])?;
        Ok(())
    }

    /// Removes the junction row linking two rows.
    pub fn remove_link(
        &self,
        junction_repository: &str,
        owner: (&str, &Value),
        target: (&str, &Value),
    ) -> Result<(), StorageError> {
        let link = self.link_parts(junction_repository, owner, target)?;
        let text = format!(
            "DELETE FROM [{}].[{}] WHERE [{}] = {} AND [{}] = {} LIMIT 1",
            link.storage,
            link.repository,
            link.owner_column,
            link.owner_marker,
            link.target_column,
            link.target_marker
        );
        self.executor
            .execute(&text, &[link.owner_value, link.target_value])?;
        Ok(())
    }

    /// Fetches rows of `spec.entity` linked to one owner row through a
    /// junction table.
    pub fn fetch_related(
        &self,
        spec: &QuerySpecification,
        junction_repository: &str,
        owner_entity: &str,
        owner_pk: &Value,
    ) -> Result<Vec<Value>, StorageError> {
        let related = self.related_spec(spec, junction_repository, owner_entity, owner_pk)?;
        self.fetch(&related)
    }

    /// Counts rows of `spec.entity` linked to one owner row.
    pub fn count_related(
        &self,
        spec: &QuerySpecification,
        junction_repository: &str,
        owner_entity: &str,
        owner_pk: &Value,
    ) -> Result<u64, StorageError> {
        let related = self.related_spec(spec, junction_repository, owner_entity, owner_pk)?;
        self.count(&related)
    }

    fn related_spec(
        &self,
        spec: &QuerySpecification,
        junction_repository: &str,
        owner_entity: &str,
        owner_pk: &Value,
    ) -> Result<QuerySpecification, StorageError> {
        let owner = self.catalog.entity(owner_entity)?;
        let target = self.catalog.entity(&spec.entity)?;
        let (junction_storage, junction_repo) =
            self.catalog.split_repository_ref(junction_repository);
        let owner_schema = self.resolver.resolve(&self.catalog, owner)?;
        let owner_key = owner.primary_key()?;
        let target_key = target.primary_key()?;
        let target_storage = self.catalog.storage_for_entity(target).to_owned();
        let owner_marker = placeholder_marker(
            &owner_schema,
            self.catalog.storage_for_property(owner, owner_key),
            self.catalog.repository_for_property(owner, owner_key),
            &owner_key.column,
        )?;
        let bound_owner = self.import_value(&owner_schema, owner, owner_key, owner_pk)?;

        let mut join = format!(
            " JOIN [{junction_storage}].[{junction_repo}] ON [{junction_storage}].[{junction_repo}].[{}] = [{target_storage}].[{}].[{}] AND [{junction_storage}].[{junction_repo}].[{}] = {owner_marker}",
            target.repository, target.repository, target_key.column, owner.repository
        );
        if let Some(soft) = target.soft_delete()? {
            join.push_str(&format!(
                " AND [{target_storage}].[{}].[{}] = 0",
                target.repository, soft.column
            ));
        }
        let mut related = spec.clone();
        related.join.append(&join, vec![bound_owner]);
        Ok(related)
    }

    fn link_parts(
        &self,
        junction_repository: &str,
        owner: (&str, &Value),
        target: (&str, &Value),
    ) -> Result<LinkParts, StorageError> {
        let owner_entity = self.catalog.entity(owner.0)?;
        let target_entity = self.catalog.entity(target.0)?;
        let (storage, repository) = self.catalog.split_repository_ref(junction_repository);
        let owner_schema = self.resolver.resolve(&self.catalog, owner_entity)?;
        let target_schema = self.resolver.resolve(&self.catalog, target_entity)?;
        let owner_key = owner_entity.primary_key()?;
        let target_key = target_entity.primary_key()?;
        let owner_marker = placeholder_marker(
            &owner_schema,
            self.catalog.storage_for_property(owner_entity, owner_key),
            self.catalog.repository_for_property(owner_entity, owner_key),
            &owner_key.column,
        )?;
        let target_marker = placeholder_marker(
            &target_schema,
            self.catalog.storage_for_property(target_entity, target_key),
            self.catalog.repository_for_property(target_entity, target_key),
            &target_key.column,
        )?;
        Ok(LinkParts {
            storage,
            repository,
            owner_column: owner_entity.repository.clone(),
            target_column: target_entity.repository.clone(),
            owner_marker,
            target_marker,
            owner_value: self.import_value(&owner_schema, owner_entity, owner_key, owner.1)?,
            target_value: self.import_value(&target_schema, target_entity, target_key, target.1)?,
        })
    }

    /// Groups provided attributes by their (storage, repository) pair,
    /// converting each value to its bound form.
    fn group_attributes(
        &self,
        entity: &EntityInformation,
        schema: &SchemaInfo,
        attributes: &Map<String, Value>,
        skip_primary: bool,
    ) -> Result<Vec<ColumnGroup>, StorageError> {
        let mut groups: Vec<ColumnGroup> = Vec::new();
        for property in entity.persistable_properties() {
            if skip_primary && property.name == entity.primary_property {
                continue;
            }
            let Some(value) = attributes.get(&property.name) else {
                continue;
            };
            let pair = (
                self.catalog.storage_for_property(entity, property).to_owned(),
                self.catalog
                    .repository_for_property(entity, property)
                    .to_owned(),
            );
            let bound = self.import_value(schema, entity, property, value)?;
            match groups.iter_mut().find(|(existing, _)| existing == &pair) {
                Some((_, columns)) => columns.push((property.column.clone(), bound)),
                None => groups.push((pair, vec![(property.column.clone(), bound)])),
            }
        }
        Ok(groups)
    }

    /// Applies the column's import conversion, falling back to a plain
    /// scalar binding.
    fn import_value(
        &self,
        schema: &SchemaInfo,
        entity: &EntityInformation,
        property: &PropertyInformation,
        value: &Value,
    ) -> Result<SqlValue, StorageError> {
        let storage = self.catalog.storage_for_property(entity, property);
        let repository = self.catalog.repository_for_property(entity, property);
        let conversion = schema
            .column(storage, repository, &property.column)
            .and_then(|column| column.import_conversion.clone());
        match conversion {
            Some(conversion) if !(value.is_null() && property.nullable) => {
                Ok(self.converter.import(&conversion, value, property)?)
            }
            _ => Ok(scalar_bind_value(&property.name, value)?),
        }
    }
}

struct LinkParts {
    storage: String,
    repository: String,
    owner_column: String,
    target_column: String,
    owner_marker: &'static str,
    target_marker: &'static str,
    owner_value: SqlValue,
    target_value: SqlValue,
}

fn placeholder_marker(
    schema: &SchemaInfo,
    storage: &str,
    repository: &str,
    column: &str,
) -> Result<&'static str, StorageError> {
    schema
        .placeholder_for(storage, repository, column)
        .map(|placeholder| placeholder.marker())
        .ok_or_else(|| {
            StorageError::invalid(format!(
                "column '{column}' missing from '{storage}.{repository}'"
            ))
        })
}

fn insert_statement(
    schema: &SchemaInfo,
    storage: &str,
    repository: &str,
    columns: &[(String, SqlValue)],
) -> Result<(String, Vec<SqlValue>), StorageError> {
    let mut names = Vec::with_capacity(columns.len());
    let mut markers = Vec::with_capacity(columns.len());
    let mut parameters = Vec::with_capacity(columns.len());
    for (column, value) in columns {
        names.push(format!("[{column}]"));
        markers.push(placeholder_marker(schema, storage, repository, column)?);
        parameters.push(value.clone());
    }
    let text = format!(
        "INSERT INTO [{storage}].[{repository}] ({}) VALUES ({})",
        names.join(", "),
        markers.join(", ")
    );
    Ok((text, parameters))
}
