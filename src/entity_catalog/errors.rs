//! Entity catalog errors

use thiserror::Error;

/// Errors raised while loading or querying the entity catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity '{entity}' has no property named '{property}'")]
    UnknownProperty { entity: String, property: String },

    #[error("Invalid entity mapping: {0}")]
    InvalidMapping(String),

    #[error("Failed to read mapping file '{path}': {message}")]
    ConfigRead { path: String, message: String },

    #[error("Failed to parse mapping file: {0}")]
    ConfigParse(String),
}

impl CatalogError {
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        CatalogError::UnknownEntity(name.into())
    }

    pub fn unknown_property(entity: impl Into<String>, property: impl Into<String>) -> Self {
        CatalogError::UnknownProperty {
            entity: entity.into(),
            property: property.into(),
        }
    }

    pub fn invalid_mapping(message: impl Into<String>) -> Self {
        CatalogError::InvalidMapping(message.into())
    }

    pub fn config_read(path: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::ConfigRead {
            path: path.into(),
            message: message.into(),
        }
    }
}
