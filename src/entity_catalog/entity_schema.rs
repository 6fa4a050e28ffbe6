//! Entity-to-table mapping model
//!
//! The catalog describes how domain entities map onto MySQL storage:
//! which repository (table) holds an entity, which column backs each
//! property, and how properties relate entities to one another. The
//! compiler consults this model to resolve `{property}` paths and to
//! synthesize the joins they imply.

use crate::entity_catalog::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain-level type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    Uuid,
    Json,
}

impl DataType {
    /// Short tag used in conversion filter codes, e.g. `Ointeger`.
    pub fn tag(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Bytes => "bytes",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::DateTime => "datetime",
            DataType::Uuid => "uuid",
            DataType::Json => "json",
        }
    }
}

/// How a property connects its entity to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relationship {
    /// To-one: the owner row stores the target's primary key in
    /// `owner_column`.
    One { entity: String, owner_column: String },

    /// To-one, inverted: the target row points back at the owner through
    /// `connect_via_property`.
    OneInverse {
        entity: String,
        connect_via_property: String,
    },

    /// To-one, inverted and polymorphic: the target additionally records
    /// the owner's entity name in `owner_name_in_property`.
    OneInverseDynamic {
        entity: String,
        connect_via_property: String,
        owner_name_in_property: String,
    },

    /// To-many: target rows point back at the owner, optionally
    /// discriminated by the owner's entity name.
    Many {
        entity: String,
        connect_via_property: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_name_in_property: Option<String>,
    },

    /// To-many through a junction table whose columns are named after the
    /// two repositories it links.
    ManyViaJunction {
        entity: String,
        junction_repository: String,
    },
}

impl Relationship {
    /// Name of the entity on the far side of the relationship.
    pub fn target(&self) -> &str {
        match self {
            Relationship::One { entity, .. }
            | Relationship::OneInverse { entity, .. }
            | Relationship::OneInverseDynamic { entity, .. }
            | Relationship::Many { entity, .. }
            | Relationship::ManyViaJunction { entity, .. } => entity,
        }
    }

    /// True when traversing the relationship can multiply result rows.
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            Relationship::Many { .. } | Relationship::ManyViaJunction { .. }
        )
    }
}

/// One property of an entity and its column mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInformation {
    /// Property name as used in `{property}` path tokens.
    pub name: String,
    /// Backing column in the property's repository.
    pub column: String,
    /// Domain-level value type.
    pub data_type: DataType,
    /// Whether NULL is a legal domain value for this property.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the backing column is AUTO_INCREMENT.
    #[serde(default)]
    pub auto_increment: bool,
    /// Whether insert/update statements write this property.
    #[serde(default = "default_persistable")]
    pub persistable: bool,
    /// Storage override; `None` inherits the entity's storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Repository override; `None` inherits the entity's repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Relationship carried by this property, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
}

fn default_persistable() -> bool {
    true
}

impl PropertyInformation {
    /// Plain column-backed property with sensible defaults.
    pub fn column_backed(name: impl Into<String>, column: impl Into<String>, data_type: DataType) -> Self {
        PropertyInformation {
            name: name.into(),
            column: column.into(),
            data_type,
            nullable: false,
            auto_increment: false,
            persistable: true,
            storage: None,
            repository: None,
            relationship: None,
        }
    }

    /// Relationship-bearing property. To-one `One` relationships persist
    /// their foreign key through the owner column; every other shape is
    /// read-only from the owner's point of view.
    pub fn related(name: impl Into<String>, relationship: Relationship) -> Self {
        let (column, persistable) = match &relationship {
            Relationship::One { owner_column, .. } => (owner_column.clone(), true),
            _ => (String::new(), false),
        };
        PropertyInformation {
            name: name.into(),
            column,
            data_type: DataType::Integer,
            nullable: false,
            auto_increment: false,
            persistable,
            storage: None,
            repository: None,
            relationship: Some(relationship),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_persistable(mut self) -> Self {
        self.persistable = false;
        self
    }

    pub fn in_repository(mut self, storage: Option<&str>, repository: &str) -> Self {
        self.storage = storage.map(str::to_string);
        self.repository = Some(repository.to_string());
        self
    }
}

/// One entity and its full property list, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInformation {
    /// Entity name, unique within the catalog.
    pub name: String,
    /// Main repository (table) for the entity.
    pub repository: String,
    /// Storage override; `None` uses the catalog default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Name of the primary key property.
    pub primary_property: String,
    /// Name of the soft-delete flag property, if the entity uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete_property: Option<String>,
    /// Properties in declaration order.
    pub properties: Vec<PropertyInformation>,
}

impl EntityInformation {
    pub fn new(
        name: impl Into<String>,
        repository: impl Into<String>,
        primary_property: impl Into<String>,
        properties: Vec<PropertyInformation>,
    ) -> Self {
        EntityInformation {
            name: name.into(),
            repository: repository.into(),
            storage: None,
            primary_property: primary_property.into(),
            soft_delete_property: None,
            properties,
        }
    }

    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn with_soft_delete(mut self, property: impl Into<String>) -> Self {
        self.soft_delete_property = Some(property.into());
        self
    }

    /// Looks a property up by name.
    pub fn find_property(&self, name: &str) -> Option<&PropertyInformation> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks a property up by name, erroring with entity context.
    pub fn property(&self, name: &str) -> Result<&PropertyInformation, CatalogError> {
        self.find_property(name)
            .ok_or_else(|| CatalogError::unknown_property(&self.name, name))
    }

    /// The primary key property.
    pub fn primary_key(&self) -> Result<&PropertyInformation, CatalogError> {
        self.property(&self.primary_property)
    }

    /// The soft-delete property, when configured.
    pub fn soft_delete(&self) -> Result<Option<&PropertyInformation>, CatalogError> {
        self.soft_delete_property
            .as_deref()
            .map(|name| self.property(name))
            .transpose()
    }

    /// Properties that insert/update statements write.
    pub fn persistable_properties(&self) -> impl Iterator<Item = &PropertyInformation> {
        self.properties.iter().filter(|p| p.persistable)
    }
}

/// The full entity mapping plus storage name resolution.
///
/// Storage references in the mapping are aliases; `resolve_storage` maps
/// them to physical schema names, falling back to the reference itself
/// when no alias is registered.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    default_storage: String,
    storage_aliases: HashMap<String, String>,
    entities: HashMap<String, EntityInformation>,
}

impl EntityCatalog {
    /// Builds and validates a catalog from its parts.
    ///
    /// Validation covers entity name uniqueness, primary key and
    /// soft-delete property resolution, and relationship integrity
    /// (targets exist, back-reference properties exist on the target).
    pub fn build(
        default_storage: impl Into<String>,
        storage_aliases: HashMap<String, String>,
        entities: Vec<EntityInformation>,
    ) -> Result<Self, CatalogError> {
        let default_storage = default_storage.into();
        if default_storage.is_empty() {
            return Err(CatalogError::invalid_mapping("default storage name is empty"));
        }

        let mut by_name: HashMap<String, EntityInformation> = HashMap::new();
        for entity in entities {
            if entity.repository.is_empty() {
                return Err(CatalogError::invalid_mapping(format!(
                    "entity '{}' has no repository",
                    entity.name
                )));
            }
            if by_name.insert(entity.name.clone(), entity.clone()).is_some() {
                return Err(CatalogError::invalid_mapping(format!(
                    "duplicate entity '{}'",
                    entity.name
                )));
            }
        }

        let catalog = EntityCatalog {
            default_storage,
            storage_aliases,
            entities: by_name,
        };
        catalog.validate()?;
        log::info!(
            "Entity catalog ready: {} entities, default storage '{}'",
            catalog.entities.len(),
            catalog.default_storage
        );
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for entity in self.entities.values() {
            let primary = entity.primary_key().map_err(|_| {
                CatalogError::invalid_mapping(format!(
                    "entity '{}' names unknown primary property '{}'",
                    entity.name, entity.primary_property
                ))
            })?;
            if primary.relationship.is_some() {
                return Err(CatalogError::invalid_mapping(format!(
                    "primary property '{}' of entity '{}' carries a relationship",
                    primary.name, entity.name
                )));
            }
            if let Some(soft) = &entity.soft_delete_property {
                entity.property(soft).map_err(|_| {
                    CatalogError::invalid_mapping(format!(
                        "entity '{}' names unknown soft-delete property '{}'",
                        entity.name, soft
                    ))
                })?;
            }
            for property in &entity.properties {
                if let Some(relationship) = &property.relationship {
                    self.validate_relationship(entity, property, relationship)?;
                }
            }
        }
        Ok(())
    }

    fn validate_relationship(
        &self,
        entity: &EntityInformation,
        property: &PropertyInformation,
        relationship: &Relationship,
    ) -> Result<(), CatalogError> {
        let target = self.entities.get(relationship.target()).ok_or_else(|| {
            CatalogError::invalid_mapping(format!(
                "property '{}.{}' targets unknown entity '{}'",
                entity.name,
                property.name,
                relationship.target()
            ))
        })?;
        let require_target_property = |name: &str| -> Result<(), CatalogError> {
            target.property(name).map(|_| ()).map_err(|_| {
                CatalogError::invalid_mapping(format!(
                    "property '{}.{}' references unknown property '{}' on entity '{}'",
                    entity.name, property.name, name, target.name
                ))
            })
        };
        match relationship {
            Relationship::One { owner_column, .. } => {
                if owner_column.is_empty() {
                    return Err(CatalogError::invalid_mapping(format!(
                        "property '{}.{}' has an empty owner column",
                        entity.name, property.name
                    )));
                }
            }
            Relationship::OneInverse {
                connect_via_property, ..
            } => require_target_property(connect_via_property)?,
            Relationship::OneInverseDynamic {
                connect_via_property,
                owner_name_in_property,
                ..
            } => {
                require_target_property(connect_via_property)?;
                require_target_property(owner_name_in_property)?;
            }
            Relationship::Many {
                connect_via_property,
                owner_name_in_property,
                ..
            } => {
                require_target_property(connect_via_property)?;
                if let Some(name) = owner_name_in_property {
                    require_target_property(name)?;
                }
            }
            Relationship::ManyViaJunction {
                junction_repository, ..
            } => {
                if junction_repository.is_empty() {
                    return Err(CatalogError::invalid_mapping(format!(
                        "property '{}.{}' has an empty junction repository",
                        entity.name, property.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Looks an entity up by name.
    pub fn entity(&self, name: &str) -> Result<&EntityInformation, CatalogError> {
        self.entities
            .get(name)
            .ok_or_else(|| CatalogError::unknown_entity(name))
    }

    /// The catalog's default physical storage name.
    pub fn default_storage(&self) -> &str {
        &self.default_storage
    }

    /// Resolves a storage alias to its physical schema name.
    pub fn resolve_storage<'a>(&'a self, reference: &'a str) -> &'a str {
        self.storage_aliases
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference)
    }

    /// Physical storage name holding the entity's main repository.
    pub fn storage_for_entity<'a>(&'a self, entity: &'a EntityInformation) -> &'a str {
        match &entity.storage {
            Some(alias) => self.resolve_storage(alias),
            None => &self.default_storage,
        }
    }

    /// Physical storage name holding the property's column, honoring the
    /// property-level override.
    pub fn storage_for_property<'a>(
        &'a self,
        entity: &'a EntityInformation,
        property: &'a PropertyInformation,
    ) -> &'a str {
        match &property.storage {
            Some(alias) => self.resolve_storage(alias),
            None => self.storage_for_entity(entity),
        }
    }

    /// Repository holding the property's column, honoring the
    /// property-level override.
    pub fn repository_for_property<'a>(
        &self,
        entity: &'a EntityInformation,
        property: &'a PropertyInformation,
    ) -> &'a str {
        property.repository.as_deref().unwrap_or(&entity.repository)
    }

    /// Splits a repository reference of the form `storage.repository` or
    /// bare `repository`, resolving the storage part.
    pub fn split_repository_ref(&self, reference: &str) -> (String, String) {
        match reference.split_once('.') {
            Some((storage, repository)) => {
                (self.resolve_storage(storage).to_string(), repository.to_string())
            }
            None => (self.default_storage.clone(), reference.to_string()),
        }
    }
}
