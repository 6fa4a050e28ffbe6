//! Per-compilation state
//!
//! One `CompilationContext` lives for exactly one `compile` call. It owns
//! the join registry, the accumulated join SQL, junction alias bindings
//! and the select column alias map, so successive compilations never see
//! each other's aliases.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity_catalog::{EntityCatalog, EntityInformation};
use crate::query_compiler::errors::CompileError;
use crate::query_compiler::registry::JoinKeyRegistry;
use crate::query_compiler::CompilerOptions;
use crate::schema_metadata::{SchemaInfo, SchemaMetadataResolver};

pub(crate) struct CompilationContext<'a> {
    pub(crate) catalog: &'a EntityCatalog,
    pub(crate) resolver: &'a SchemaMetadataResolver,
    pub(crate) options: &'a CompilerOptions,
    pub(crate) registry: JoinKeyRegistry,
    /// Rendered join SQL in synthesis order, keyed by alias for reuse checks.
    joins: Vec<(String, String)>,
    /// `storage.repository` of tables already reachable through an
    /// aliased join, mapped to that alias.
    pub(crate) junction_aliases: HashMap<String, String>,
    /// Short select alias -> logical dotted path, in short alias mode.
    pub(crate) column_aliases: HashMap<String, String>,
    column_counter: usize,
    pub(crate) distinct: bool,
}

impl<'a> CompilationContext<'a> {
    pub(crate) fn new(
        catalog: &'a EntityCatalog,
        resolver: &'a SchemaMetadataResolver,
        options: &'a CompilerOptions,
        base: &EntityInformation,
        distinct: bool,
    ) -> Self {
        let mut junction_aliases = HashMap::new();
        if options.alias_tables {
            let storage = catalog.storage_for_entity(base);
            junction_aliases.insert(format!("{storage}.{}", base.repository), "t0".to_owned());
        }
        CompilationContext {
            catalog,
            resolver,
            options,
            registry: JoinKeyRegistry::new(),
            joins: Vec::new(),
            junction_aliases,
            column_aliases: HashMap::new(),
            column_counter: 0,
            distinct,
        }
    }

    /// Records a rendered join unless that alias already has one.
    pub(crate) fn push_join(&mut self, alias: &str, sql: String) {
        if self.joins.iter().any(|(existing, _)| existing == alias) {
            return;
        }
        self.joins.push((alias.to_owned(), sql));
    }

    /// All rendered joins concatenated in synthesis order. Each join
    /// carries its own leading space.
    pub(crate) fn rendered_joins(&self) -> String {
        self.joins.iter().map(|(_, sql)| sql.as_str()).collect()
    }

    /// Trailing comment tying an alias back to its canonical join key.
    pub(crate) fn comment(&self, alias: &str, key: &str) -> String {
        if self.options.comment_joins {
            format!(" /** {alias} => {key} */")
        } else {
            String::new()
        }
    }

    /// Column reference on the owner side of a join or a terminal path.
    ///
    /// Prefers the alias the owner was reached through; with table
    /// aliasing on, falls back to an alias already covering the owner's
    /// table; otherwise emits the full `[storage].[repository].[column]`
    /// form.
    pub(crate) fn owner_column_ref(
        &self,
        owner_alias: Option<&str>,
        storage: &str,
        repository: &str,
        column: &str,
    ) -> String {
        if let Some(alias) = owner_alias {
            return format!("[{alias}].[{column}]");
        }
        if self.options.alias_tables {
            if let Some(alias) = self.junction_aliases.get(&format!("{storage}.{repository}")) {
                return format!("[{alias}].[{column}]");
            }
        }
        format!("[{storage}].[{repository}].[{column}]")
    }

    /// Registers a select column alias, shortening it in short alias mode.
    pub(crate) fn register_select_alias(&mut self, logical: String) -> String {
        if self.options.short_column_names {
            let short = format!("c{}", self.column_counter);
            self.column_counter += 1;
            self.column_aliases.insert(short.clone(), logical);
            short
        } else {
            logical
        }
    }

    /// Resolves live schema metadata for an entity through the shared resolver.
    pub(crate) fn resolve_schema(
        &self,
        entity: &EntityInformation,
    ) -> Result<Arc<SchemaInfo>, CompileError> {
        Ok(self.resolver.resolve(self.catalog, entity)?)
    }
}
