//! Entity mapping configuration
//!
//! Entity mappings are defined in YAML with the following structure:
//!
//! ```yaml
//! default_storage: main          # Physical schema used when not overridden
//! storage_aliases:               # Logical storage name -> physical schema
//!   archive: archive_2024
//! entities:
//!   - name: Article              # Entity name used in query specifications
//!     repository: articles       # Backing table
//!     primary_property: id
//!     soft_delete_property: deleted   # Optional
//!     properties:
//!       - name: id
//!         data_type: integer
//!         auto_increment: true
//!       - name: title
//!         data_type: text
//!       - name: author           # Relationship-bearing property
//!         relationship:
//!           kind: one
//!           entity: Author
//!           owner_column: author_id
//! ```
//!
//! `column` defaults to the property name; `one` relationships default it
//! to their owner column.

use crate::entity_catalog::entity_schema::{
    DataType, EntityCatalog, EntityInformation, PropertyInformation, Relationship,
};
use crate::entity_catalog::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Top-level mapping configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub default_storage: String,
    #[serde(default)]
    pub storage_aliases: HashMap<String, String>,
    pub entities: Vec<EntityDefinition>,
}

/// Entity definition in mapping config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub repository: String,
    #[serde(default)]
    pub storage: Option<String>,
    pub primary_property: String,
    #[serde(default)]
    pub soft_delete_property: Option<String>,
    pub properties: Vec<PropertyDefinition>,
}

/// Property definition in mapping config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    /// Backing column; defaults to the property name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub auto_increment: bool,
    /// Defaults to true for column-backed properties; relationship
    /// properties other than `one` are never persistable.
    #[serde(default)]
    pub persistable: Option<bool>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub relationship: Option<Relationship>,
}

impl CatalogConfig {
    /// Loads a mapping configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path_text = path.as_ref().display().to_string();
        let contents = fs::read_to_string(path)
            .map_err(|e| CatalogError::config_read(path_text, e.to_string()))?;
        Self::from_yaml_str(&contents)
    }

    /// Parses a mapping configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParse(e.to_string()))
    }

    /// Converts the configuration into a validated [`EntityCatalog`].
    pub fn to_catalog(&self) -> Result<EntityCatalog, CatalogError> {
        let mut entities = Vec::with_capacity(self.entities.len());
        for definition in &self.entities {
            entities.push(definition.to_entity()?);
        }
        EntityCatalog::build(
            self.default_storage.clone(),
            self.storage_aliases.clone(),
            entities,
        )
    }
}

impl EntityDefinition {
    fn to_entity(&self) -> Result<EntityInformation, CatalogError> {
        let mut properties = Vec::with_capacity(self.properties.len());
        for definition in &self.properties {
            properties.push(definition.to_property(&self.name)?);
        }
        Ok(EntityInformation {
            name: self.name.clone(),
            repository: self.repository.clone(),
            storage: self.storage.clone(),
            primary_property: self.primary_property.clone(),
            soft_delete_property: self.soft_delete_property.clone(),
            properties,
        })
    }
}

impl PropertyDefinition {
    fn to_property(&self, entity: &str) -> Result<PropertyInformation, CatalogError> {
        let column = match (&self.column, &self.relationship) {
            (Some(column), _) => column.clone(),
            (None, Some(Relationship::One { owner_column, .. })) => owner_column.clone(),
            (None, Some(_)) => String::new(),
            (None, None) => self.name.clone(),
        };
        let persistable = match &self.relationship {
            Some(Relationship::One { .. }) | None => self.persistable.unwrap_or(true),
            Some(_) => {
                if self.persistable == Some(true) {
                    return Err(CatalogError::invalid_mapping(format!(
                        "property '{}.{}' cannot be persistable: only 'one' relationships write a column",
                        entity, self.name
                    )));
                }
                false
            }
        };
        let data_type = self.data_type.unwrap_or(match &self.relationship {
            Some(_) => DataType::Integer,
            None => DataType::Text,
        });
        Ok(PropertyInformation {
            name: self.name.clone(),
            column,
            data_type,
            nullable: self.nullable,
            auto_increment: self.auto_increment,
            persistable,
            storage: self.storage.clone(),
            repository: self.repository.clone(),
            relationship: self.relationship.clone(),
        })
    }
}
