//! Schema metadata errors

use crate::entity_catalog::CatalogError;
use thiserror::Error;

/// Errors raised while resolving live schema metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Repository '{storage}.{repository}' does not exist or has no columns")]
    UnknownRepository { storage: String, repository: String },

    #[error("Column '{column}' backing property '{entity}.{property}' not found in '{storage}.{repository}'")]
    MissingColumn {
        entity: String,
        property: String,
        column: String,
        storage: String,
        repository: String,
    },

    #[error("Unsupported column type '{column_type}' on '{storage}.{repository}.{column}'")]
    UnsupportedColumnType {
        column_type: String,
        storage: String,
        repository: String,
        column: String,
    },

    #[error("Schema introspection failed: {0}")]
    Introspection(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SchemaError {
    pub fn unknown_repository(storage: impl Into<String>, repository: impl Into<String>) -> Self {
        SchemaError::UnknownRepository {
            storage: storage.into(),
            repository: repository.into(),
        }
    }

    pub fn missing_column(
        entity: impl Into<String>,
        property: impl Into<String>,
        column: impl Into<String>,
        storage: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        SchemaError::MissingColumn {
            entity: entity.into(),
            property: property.into(),
            column: column.into(),
            storage: storage.into(),
            repository: repository.into(),
        }
    }

    pub fn introspection(message: impl Into<String>) -> Self {
        SchemaError::Introspection(message.into())
    }
}
