//! Live schema metadata: introspection, typed placeholders, caching.

pub mod errors;
pub mod introspect;
pub mod placeholder;
pub mod resolver;

pub use errors::SchemaError;
pub use introspect::{MetadataCache, RawColumn, SchemaIntrospector, TableStatus};
pub use placeholder::{column_type_family, Placeholder};
pub use resolver::{ColumnSchema, RepositorySchema, SchemaInfo, SchemaMetadataResolver};
