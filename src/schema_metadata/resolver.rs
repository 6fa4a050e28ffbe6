//! Schema metadata resolution
//!
//! For each entity the resolver assembles a [`SchemaInfo`]: every
//! repository the entity's properties touch, each column's typed
//! placeholder, the conversion codes pairing column families with domain
//! types, and whether all repositories sit on a transactional engine.
//!
//! Resolution is layered: an in-process memo first, then the optional
//! persistent cache, then a fresh build against the introspector. Strict
//! mode skips both lookup layers and rebuilds on every call, which keeps
//! long-running processes honest while a schema is being migrated.

use crate::data_converter::DataConverter;
use crate::entity_catalog::{EntityCatalog, EntityInformation};
use crate::schema_metadata::errors::SchemaError;
use crate::schema_metadata::introspect::{MetadataCache, SchemaIntrospector};
use crate::schema_metadata::placeholder::{column_type_family, Placeholder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One column with everything the compiler needs to bind against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub column: String,
    pub column_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub extra: Option<String>,
    pub placeholder: Placeholder,
    /// Conversion code applied to values read from this column.
    pub export_conversion: Option<String>,
    /// Conversion code applied to values bound against this column.
    pub import_conversion: Option<String>,
}

/// Columns of one repository an entity maps onto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySchema {
    pub storage: String,
    pub repository: String,
    pub columns: HashMap<String, ColumnSchema>,
}

/// Resolved schema metadata for one entity.
///
/// `repositories` lists the entity's main repository first, followed by
/// property-level overrides in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub entity: String,
    pub repositories: Vec<RepositorySchema>,
    /// True when every repository uses a transactional engine.
    pub transaction_enabled: bool,
}

impl SchemaInfo {
    /// The repository schema for a storage/repository pair.
    pub fn repository(&self, storage: &str, repository: &str) -> Option<&RepositorySchema> {
        self.repositories
            .iter()
            .find(|r| r.storage == storage && r.repository == repository)
    }

    /// The column schema at a fully qualified location.
    pub fn column(&self, storage: &str, repository: &str, column: &str) -> Option<&ColumnSchema> {
        self.repository(storage, repository)
            .and_then(|r| r.columns.get(column))
    }

    /// Typed placeholder for a fully qualified column.
    pub fn placeholder_for(
        &self,
        storage: &str,
        repository: &str,
        column: &str,
    ) -> Option<Placeholder> {
        self.column(storage, repository, column).map(|c| c.placeholder)
    }
}

/// Resolves and caches [`SchemaInfo`] per entity.
pub struct SchemaMetadataResolver {
    introspector: Arc<dyn SchemaIntrospector>,
    converter: Arc<dyn DataConverter>,
    cache: Option<Arc<dyn MetadataCache>>,
    strict: bool,
    memo: RwLock<HashMap<String, Arc<SchemaInfo>>>,
}

impl SchemaMetadataResolver {
    pub fn new(introspector: Arc<dyn SchemaIntrospector>, converter: Arc<dyn DataConverter>) -> Self {
        SchemaMetadataResolver {
            introspector,
            converter,
            cache: None,
            strict: false,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Attaches a persistent metadata cache.
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Rebuild metadata on every call instead of reading memo or cache.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Resolves schema metadata for an entity.
    pub fn resolve(
        &self,
        catalog: &EntityCatalog,
        entity: &EntityInformation,
    ) -> Result<Arc<SchemaInfo>, SchemaError> {
        let key = entity.name.clone();
        if !self.strict {
            if let Some(found) = self
                .memo
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
            {
                log::debug!("Schema metadata memo hit for '{}'", key);
                return Ok(found.clone());
            }
            if let Some(cache) = &self.cache {
                if let Some(blob) = cache.load(&key) {
                    match serde_json::from_str::<SchemaInfo>(&blob) {
                        Ok(info) => {
                            log::debug!("Schema metadata cache hit for '{}'", key);
                            let info = Arc::new(info);
                            self.memoize(key, info.clone());
                            return Ok(info);
                        }
                        Err(e) => {
                            log::warn!("Discarding cached schema for '{}': {}", key, e);
                        }
                    }
                }
            }
        }

        let info = Arc::new(self.build(catalog, entity)?);
        if let Some(cache) = &self.cache {
            match serde_json::to_string(info.as_ref()) {
                Ok(blob) => cache.store(&key, &blob),
                Err(e) => log::warn!("Cannot serialize schema for '{}': {}", key, e),
            }
        }
        self.memoize(key, info.clone());
        Ok(info)
    }

    fn memoize(&self, key: String, info: Arc<SchemaInfo>) {
        self.memo
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, info);
    }

    fn build(
        &self,
        catalog: &EntityCatalog,
        entity: &EntityInformation,
    ) -> Result<SchemaInfo, SchemaError> {
        log::info!("Resolving schema metadata for entity '{}'", entity.name);

        // Main repository first, property overrides in declaration order.
        let mut pairs: Vec<(String, String)> = vec![(
            catalog.storage_for_entity(entity).to_string(),
            entity.repository.clone(),
        )];
        for property in &entity.properties {
            let pair = (
                catalog.storage_for_property(entity, property).to_string(),
                catalog.repository_for_property(entity, property).to_string(),
            );
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }

        let mut repositories = Vec::with_capacity(pairs.len());
        let mut transaction_enabled = true;
        for (storage, repository) in &pairs {
            let raw = self.introspector.columns(storage, repository)?;
            if raw.is_empty() {
                return Err(SchemaError::unknown_repository(storage, repository));
            }

            let mut columns = HashMap::with_capacity(raw.len());
            for raw_column in raw {
                let placeholder = Placeholder::for_column_type(&raw_column.column_type)
                    .ok_or_else(|| SchemaError::UnsupportedColumnType {
                        column_type: raw_column.column_type.clone(),
                        storage: storage.clone(),
                        repository: repository.clone(),
                        column: raw_column.field.clone(),
                    })?;

                let property = entity.properties.iter().find(|p| {
                    !p.column.is_empty()
                        && p.column == raw_column.field
                        && catalog.storage_for_property(entity, p) == storage
                        && catalog.repository_for_property(entity, p) == repository
                });
                let (export_conversion, import_conversion) = match property {
                    Some(p) => {
                        let family = column_type_family(&raw_column.column_type);
                        let tag = p.data_type.tag();
                        (
                            self.converter.conversion_for(&format!("D{family}->O{tag}")),
                            self.converter.conversion_for(&format!("O{tag}->D{family}")),
                        )
                    }
                    None => (None, None),
                };

                columns.insert(
                    raw_column.field.clone(),
                    ColumnSchema {
                        column: raw_column.field,
                        column_type: raw_column.column_type,
                        nullable: raw_column.nullable,
                        key: raw_column.key,
                        default: raw_column.default,
                        extra: raw_column.extra,
                        placeholder,
                        export_conversion,
                        import_conversion,
                    },
                );
            }

            let status = self.introspector.table_status(storage, repository)?;
            let transactional = status
                .and_then(|status| status.engine)
                .map(|engine| engine.eq_ignore_ascii_case("InnoDB"))
                .unwrap_or(false);
            transaction_enabled = transaction_enabled && transactional;

            repositories.push(RepositorySchema {
                storage: storage.clone(),
                repository: repository.clone(),
                columns,
            });
        }

        let info = SchemaInfo {
            entity: entity.name.clone(),
            repositories,
            transaction_enabled,
        };

        // Every mapped column must exist in its repository.
        for property in &entity.properties {
            if property.column.is_empty() {
                continue;
            }
            let storage = catalog.storage_for_property(entity, property);
            let repository = catalog.repository_for_property(entity, property);
            if info.column(storage, repository, &property.column).is_none() {
                return Err(SchemaError::MissingColumn {
                    entity: entity.name.clone(),
                    property: property.name.clone(),
                    column: property.column.clone(),
                    storage: storage.to_string(),
                    repository: repository.to_string(),
                });
            }
        }

        Ok(info)
    }
}
