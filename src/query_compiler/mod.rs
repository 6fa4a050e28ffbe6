//! Property path query compiler
//!
//! Turns a `QuerySpecification` whose fragments embed `{prop}.{prop}`
//! property paths into executable SQL. Paths become deduplicated joins
//! derived from the entity catalog, `?` markers become typed placeholders
//! resolved from live schema metadata, and the fragments are assembled
//! into a single statement with its ordered parameter list.

mod assembler;
mod context;
mod errors;
mod fragment;
mod joins;
mod junction;
mod paths;
mod registry;

pub use errors::CompileError;
pub use registry::{column_part, join_key, JoinKeyRegistry, JoinKind};

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity_catalog::EntityCatalog;
use crate::query_spec::QuerySpecification;
use crate::schema_metadata::SchemaMetadataResolver;
use crate::value::SqlValue;

/// Compilation switches. Defaults match plain fully-qualified output with
/// join comments on.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Alias every table, reserving `t0` for the base table.
    pub alias_tables: bool,
    /// Emit `c<N>` select aliases with a reverse map instead of dotted
    /// logical paths.
    pub short_column_names: bool,
    /// Append `/** alias => key */` comments to generated joins.
    pub comment_joins: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            alias_tables: false,
            short_column_names: false,
            comment_joins: true,
        }
    }
}

/// A compiled statement: SQL text carrying typed markers, parameters in
/// marker order, and the select alias map when short aliases are on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub text: String,
    pub parameters: Vec<SqlValue>,
    pub column_aliases: HashMap<String, String>,
}

/// Compiles query specifications against one catalog and schema resolver.
pub struct QueryCompiler {
    catalog: Arc<EntityCatalog>,
    resolver: Arc<SchemaMetadataResolver>,
    options: CompilerOptions,
}

impl QueryCompiler {
    pub fn new(catalog: Arc<EntityCatalog>, resolver: Arc<SchemaMetadataResolver>) -> Self {
        QueryCompiler::with_options(catalog, resolver, CompilerOptions::default())
    }

    pub fn with_options(
        catalog: Arc<EntityCatalog>,
        resolver: Arc<SchemaMetadataResolver>,
        options: CompilerOptions,
    ) -> Self {
        QueryCompiler {
            catalog,
            resolver,
            options,
        }
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    pub fn resolver(&self) -> &Arc<SchemaMetadataResolver> {
        &self.resolver
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles one specification into an executable statement.
    pub fn compile(&self, spec: &QuerySpecification) -> Result<CompiledQuery, CompileError> {
        let compiled = assembler::assemble(&self.catalog, &self.resolver, &self.options, spec)?;
        log::debug!("Compiled '{}' query: {}", spec.entity, compiled.text);
        Ok(compiled)
    }
}
