//! Property path resolution
//!
//! Walks `{a}.{b}.{c}` blocks against the entity catalog, synthesizing
//! joins hop by hop, and re-renders each fragment's pieces into SQL text.
//! A parameter marker anywhere between a path block and the next block is
//! typed from that block's terminal column; a select block with no
//! trailing marker gets an ` AS [alias]` projection alias instead.

use crate::entity_catalog::{EntityInformation, PropertyInformation, Relationship};
use crate::query_compiler::context::CompilationContext;
use crate::query_compiler::errors::CompileError;
use crate::query_compiler::fragment::{render_path, tokenize, FragmentPiece};
use crate::query_compiler::joins::{self, HopContext};
use crate::query_compiler::junction::resolve_junction_tokens;
use crate::schema_metadata::{Placeholder, SchemaError};

/// Which clause a fragment belongs to. Select fragments are the only
/// ones that receive projection aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentKind {
    Select,
    Where,
    OrderBy,
    Join,
}

/// Terminal coordinates of one walked path block.
struct ResolvedPath<'a> {
    terminal_entity: &'a EntityInformation,
    terminal_property: &'a PropertyInformation,
    storage: String,
    repository: String,
    owner_alias: Option<String>,
    dotted_alias: String,
}

/// Processes one fragment: junction tokens first, then path blocks, then
/// the piece list is rendered back into text.
pub(crate) fn process_fragment<'a>(
    ctx: &mut CompilationContext<'a>,
    entity: &'a EntityInformation,
    text: &str,
    kind: FragmentKind,
) -> Result<String, CompileError> {
    if text.is_empty() {
        return Ok(String::new());
    }
    let pieces = tokenize(text);
    let pieces = resolve_junction_tokens(ctx, entity, pieces)?;
    let mut out = String::new();
    let mut active_placeholder: Option<Placeholder> = None;
    for (index, piece) in pieces.iter().enumerate() {
        match piece {
            FragmentPiece::Text(value) => out.push_str(value),
            FragmentPiece::Marker => match active_placeholder {
                Some(placeholder) => out.push_str(placeholder.marker()),
                None => {
                    log::warn!(
                        "Parameter marker in '{text}' follows no property path; passing it through untyped"
                    );
                    out.push('?');
                }
            },
            FragmentPiece::Junction {
                repository,
                entity: name,
            } => {
                // not part of a `= ?` predicate; render it back verbatim
                out.push_str(&format!("{{*{repository},{name}}}"));
            }
            FragmentPiece::Path(segments) => {
                let marker_follows = pieces[index + 1..]
                    .iter()
                    .take_while(|next| {
                        matches!(next, FragmentPiece::Text(_) | FragmentPiece::Marker)
                    })
                    .any(|next| matches!(next, FragmentPiece::Marker));
                let resolved = resolve_path(ctx, entity, segments)?;
                if resolved.terminal_property.column.is_empty() {
                    return Err(SchemaError::missing_column(
                        &resolved.terminal_entity.name,
                        &resolved.terminal_property.name,
                        "",
                        &resolved.storage,
                        &resolved.repository,
                    )
                    .into());
                }
                let column_ref = ctx.owner_column_ref(
                    resolved.owner_alias.as_deref(),
                    &resolved.storage,
                    &resolved.repository,
                    &resolved.terminal_property.column,
                );
                if marker_follows {
                    let schema = ctx.resolve_schema(resolved.terminal_entity)?;
                    let placeholder = schema
                        .placeholder_for(
                            &resolved.storage,
                            &resolved.repository,
                            &resolved.terminal_property.column,
                        )
                        .ok_or_else(|| {
                            SchemaError::missing_column(
                                &resolved.terminal_entity.name,
                                &resolved.terminal_property.name,
                                &resolved.terminal_property.column,
                                &resolved.storage,
                                &resolved.repository,
                            )
                        })?;
                    active_placeholder = Some(placeholder);
                    out.push_str(&column_ref);
                } else {
                    active_placeholder = None;
                    if kind == FragmentKind::Select {
                        let alias = ctx.register_select_alias(resolved.dotted_alias);
                        out.push_str(&column_ref);
                        out.push_str(&format!(" AS [{alias}]"));
                    } else {
                        out.push_str(&column_ref);
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Walks one path block. The walk hops through relationship properties
/// and stops at the first non-relationship property or the last segment,
/// whichever comes first.
fn resolve_path<'a>(
    ctx: &mut CompilationContext<'a>,
    default_entity: &'a EntityInformation,
    segments: &[String],
) -> Result<ResolvedPath<'a>, CompileError> {
    let catalog = ctx.catalog;
    let mut entity = default_entity;
    let mut owner_alias: Option<String> = None;
    let mut dotted = String::new();
    let count = segments.len();
    for (index, segment) in segments.iter().enumerate() {
        let property = entity.property(segment)?;
        let relationship = match &property.relationship {
            Some(relationship) if index + 1 < count => relationship,
            _ => {
                if index + 1 < count {
                    log::warn!(
                        "Path '{}' ends at non-relationship property '{}'; trailing segments are ignored",
                        render_path(segments),
                        property.name
                    );
                }
                let storage = catalog.storage_for_property(entity, property).to_owned();
                let repository = catalog.repository_for_property(entity, property).to_owned();
                dotted.push_str(&property.name);
                return Ok(ResolvedPath {
                    terminal_entity: entity,
                    terminal_property: property,
                    storage,
                    repository,
                    owner_alias,
                    dotted_alias: dotted,
                });
            }
        };
        if matches!(relationship, Relationship::OneInverseDynamic { .. }) && index + 2 != count {
            return Err(CompileError::auto_join(
                render_path(segments),
                format!(
                    "polymorphic relationship '{}' may only appear as the final hop",
                    property.name
                ),
            ));
        }
        let owner_storage = catalog.storage_for_property(entity, property).to_owned();
        let owner_repository = catalog.repository_for_property(entity, property).to_owned();
        let owned = catalog.entity(relationship.target())?;
        let owned_storage = catalog.storage_for_entity(owned).to_owned();
        let hop = HopContext {
            owner_entity: entity,
            owner_storage: &owner_storage,
            owner_repository: &owner_repository,
            owner_alias: owner_alias.as_deref(),
            owned,
            owned_storage: &owned_storage,
        };
        let alias = joins::synthesize(ctx, &hop, relationship)?;
        if relationship.is_to_many() {
            ctx.distinct = true;
        }
        dotted.push_str(&property.name);
        dotted.push('.');
        entity = owned;
        owner_alias = Some(alias);
    }
    Err(CompileError::auto_join(
        render_path(segments),
        "property path is empty",
    ))
}
