//! Schema introspection and metadata caching traits
//!
//! The resolver learns about tables through [`SchemaIntrospector`], which
//! a driver layer implements over `SHOW COLUMNS` and `SHOW TABLE STATUS`.
//! Resolved metadata can be persisted between processes through an
//! optional [`MetadataCache`].

use crate::schema_metadata::errors::SchemaError;
use serde::{Deserialize, Serialize};

/// One column as reported by `SHOW COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    /// Column name.
    pub field: String,
    /// Reported type, e.g. `int(11) unsigned` or `varchar(255)`.
    pub column_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Key participation, e.g. `PRI` or `MUL`.
    #[serde(default)]
    pub key: Option<String>,
    /// Column default, as reported.
    #[serde(default)]
    pub default: Option<String>,
    /// Extra attributes, e.g. `auto_increment`.
    #[serde(default)]
    pub extra: Option<String>,
}

impl RawColumn {
    pub fn new(field: impl Into<String>, column_type: impl Into<String>, nullable: bool) -> Self {
        RawColumn {
            field: field.into(),
            column_type: column_type.into(),
            nullable,
            key: None,
            default: None,
            extra: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// One table as reported by `SHOW TABLE STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStatus {
    /// Table name.
    pub name: String,
    /// Storage engine, when the server reports one.
    pub engine: Option<String>,
}

impl TableStatus {
    pub fn new(name: impl Into<String>, engine: Option<String>) -> Self {
        TableStatus {
            name: name.into(),
            engine,
        }
    }
}

/// Reads table structure from a live MySQL server.
pub trait SchemaIntrospector: Send + Sync {
    /// Columns of `storage.repository`, in table order. An empty list
    /// means the repository does not exist.
    fn columns(&self, storage: &str, repository: &str) -> Result<Vec<RawColumn>, SchemaError>;

    /// Status row of `storage.repository`, when the table exists.
    fn table_status(
        &self,
        storage: &str,
        repository: &str,
    ) -> Result<Option<TableStatus>, SchemaError>;
}

/// Persists resolved schema metadata between processes.
///
/// Payloads are opaque serialized blobs keyed by entity name. A cache
/// returning stale data is tolerated; the resolver discards anything it
/// cannot deserialize.
pub trait MetadataCache: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, payload: &str);
}
