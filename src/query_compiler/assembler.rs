//! Statement assembly
//!
//! Renders a processed query specification into final SQL text plus the
//! ordered parameter list. Clause order is fixed: SELECT, FROM, joins,
//! WHERE, ORDER BY, LIMIT, OFFSET. Parameters concatenate in that same
//! order regardless of when each fragment was processed.

use std::sync::LazyLock;

use regex::Regex;

use crate::entity_catalog::EntityCatalog;
use crate::query_compiler::context::CompilationContext;
use crate::query_compiler::errors::CompileError;
use crate::query_compiler::joins::attach_side_tables;
use crate::query_compiler::paths::{process_fragment, FragmentKind};
use crate::query_compiler::{CompiledQuery, CompilerOptions};
use crate::query_spec::QuerySpecification;
use crate::schema_metadata::SchemaMetadataResolver;

/// Fragments may arrive with a leading connective so callers can chain
/// conditions blindly; the first one is dropped at assembly time.
static LEADING_CONNECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(AND|OR)\b\s*").unwrap());

fn trim_list(text: &str) -> &str {
    text.trim_end().trim_end_matches(',').trim_end()
}

pub(crate) fn assemble(
    catalog: &EntityCatalog,
    resolver: &SchemaMetadataResolver,
    options: &CompilerOptions,
    spec: &QuerySpecification,
) -> Result<CompiledQuery, CompileError> {
    if spec.entity.is_empty() {
        return Err(CompileError::MissingDefaultEntity);
    }
    let entity = catalog.entity(&spec.entity)?;
    let storage = catalog.storage_for_entity(entity).to_owned();
    let mut ctx = CompilationContext::new(catalog, resolver, options, entity, spec.distinct);

    attach_side_tables(&mut ctx, entity)?;

    let select_text = process_fragment(&mut ctx, entity, &spec.select.text, FragmentKind::Select)?;
    let where_text =
        process_fragment(&mut ctx, entity, &spec.where_clause.text, FragmentKind::Where)?;
    let order_text = process_fragment(&mut ctx, entity, &spec.order_by.text, FragmentKind::OrderBy)?;
    let join_text = process_fragment(&mut ctx, entity, &spec.join.text, FragmentKind::Join)?;

    let mut text = String::new();
    if spec.count {
        let pk = entity.primary_key()?;
        let pk_ref = ctx.owner_column_ref(None, &storage, &entity.repository, &pk.column);
        text.push_str("SELECT COUNT(");
        if ctx.distinct {
            text.push_str("DISTINCT ");
        }
        text.push_str(&pk_ref);
        text.push(')');
    } else {
        text.push_str("SELECT ");
        if ctx.distinct {
            text.push_str("DISTINCT ");
        }
        text.push_str(trim_list(&select_text));
    }

    text.push_str(" FROM ");
    if spec.from.text.is_empty() {
        text.push_str(&format!("[{storage}].[{}]", entity.repository));
        if options.alias_tables {
            text.push_str(" [t0]");
        }
    } else {
        text.push_str(trim_list(&spec.from.text));
    }

    let mut join_clause = join_text;
    join_clause.push_str(&ctx.rendered_joins());
    if !join_clause.is_empty() {
        if !join_clause.starts_with(' ') {
            text.push(' ');
        }
        text.push_str(&join_clause);
    }

    if !where_text.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&LEADING_CONNECTIVE.replace(&where_text, ""));
    }

    if !order_text.is_empty() {
        text.push_str(" ORDER BY ");
        text.push_str(trim_list(&order_text));
    }

    if !spec.limit.text.is_empty() {
        text.push_str(" LIMIT ");
        text.push_str(&spec.limit.text);
    }
    if !spec.offset.text.is_empty() {
        text.push_str(" OFFSET ");
        text.push_str(&spec.offset.text);
    }

    let mut parameters = Vec::new();
    if !spec.count {
        parameters.extend(spec.select.parameters.iter().cloned());
    }
    parameters.extend(spec.from.parameters.iter().cloned());
    parameters.extend(spec.join.parameters.iter().cloned());
    parameters.extend(spec.where_clause.parameters.iter().cloned());
    parameters.extend(spec.order_by.parameters.iter().cloned());
    parameters.extend(spec.limit.parameters.iter().cloned());
    parameters.extend(spec.offset.parameters.iter().cloned());

    Ok(CompiledQuery {
        text,
        parameters,
        column_aliases: ctx.column_aliases,
    })
}
