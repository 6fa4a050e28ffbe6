//! Entity catalog: entity-to-table mapping and its YAML configuration.

pub mod config;
pub mod entity_schema;
pub mod errors;

pub use config::{CatalogConfig, EntityDefinition, PropertyDefinition};
pub use entity_schema::{
    DataType, EntityCatalog, EntityInformation, PropertyInformation, Relationship,
};
pub use errors::CatalogError;
