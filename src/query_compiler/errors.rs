//! Query compiler errors

use crate::entity_catalog::CatalogError;
use crate::schema_metadata::SchemaError;
use thiserror::Error;

/// Errors raised while compiling a query specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Query specification names no default entity")]
    MissingDefaultEntity,

    #[error("Cannot auto-join '{path}': {reason}")]
    AutoJoin { path: String, reason: String },

    #[error("Join alias '{alias}' was never issued in this compilation")]
    UnknownAlias { alias: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CompileError {
    pub fn auto_join(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::AutoJoin {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
