//! Junction membership tokens
//!
//! A `{*repository,Entity} = ?` predicate asks whether the base row is
//! linked to a given row of `Entity` through the named junction table.
//! The token resolver rewrites suitable pieces in place: the token
//! becomes a column reference on an INNER JOIN against the junction
//! table, and the trailing marker is typed from the connected entity's
//! primary key column. Tokens not followed by `= ?` are left alone and
//! render back as literal text.

use crate::entity_catalog::EntityInformation;
use crate::query_compiler::context::CompilationContext;
use crate::query_compiler::errors::CompileError;
use crate::query_compiler::fragment::FragmentPiece;
use crate::query_compiler::registry::{column_part, join_key, JoinKind};
use crate::schema_metadata::SchemaError;

/// Rewrites `[Junction, "=", Marker]` piece runs against the base entity.
pub(crate) fn resolve_junction_tokens(
    ctx: &mut CompilationContext,
    entity: &EntityInformation,
    pieces: Vec<FragmentPiece>,
) -> Result<Vec<FragmentPiece>, CompileError> {
    if !pieces
        .iter()
        .any(|piece| matches!(piece, FragmentPiece::Junction { .. }))
    {
        return Ok(pieces);
    }
    let catalog = ctx.catalog;
    let entity_storage = catalog.storage_for_entity(entity).to_owned();
    let pk = entity.primary_key()?;
    let base_part = column_part(&entity_storage, &entity.repository, &pk.column);

    let mut out = Vec::with_capacity(pieces.len());
    let mut index = 0;
    while index < pieces.len() {
        let (repository, connected_name) = match &pieces[index] {
            FragmentPiece::Junction {
                repository,
                entity: connected,
            } => (repository, connected),
            piece => {
                out.push(piece.clone());
                index += 1;
                continue;
            }
        };
        let equals = matches!(
            (pieces.get(index + 1), pieces.get(index + 2)),
            (Some(FragmentPiece::Text(text)), Some(FragmentPiece::Marker)) if text.trim() == "="
        );
        if !equals {
            out.push(pieces[index].clone());
            index += 1;
            continue;
        }

        let connected = catalog.entity(connected_name)?;
        let connected_storage = catalog.storage_for_entity(connected).to_owned();
        let connected_pk = connected.primary_key()?;
        let key = join_key(
            &base_part,
            JoinKind::Inner,
            &column_part(
                &connected_storage,
                &connected.repository,
                &connected_pk.column,
            ),
        );
        let known = ctx.registry.contains(&key);
        let alias = ctx.registry.alias_for(&key);
        if !known {
            let (junction_storage, junction_repository) = catalog.split_repository_ref(repository);
            let base_ref =
                ctx.owner_column_ref(None, &entity_storage, &entity.repository, &pk.column);
            let comment = ctx.comment(&alias, &key);
            ctx.push_join(
                &alias,
                format!(
                    " INNER JOIN [{junction_storage}].[{junction_repository}] AS [{alias}] ON [{alias}].[{}] = {base_ref}{comment}",
                    entity.repository
                ),
            );
        }

        let pk_storage = catalog.storage_for_property(connected, connected_pk).to_owned();
        let pk_repository = catalog
            .repository_for_property(connected, connected_pk)
            .to_owned();
        let schema = ctx.resolve_schema(connected)?;
        let placeholder = schema
            .placeholder_for(&pk_storage, &pk_repository, &connected_pk.column)
            .ok_or_else(|| {
                SchemaError::missing_column(
                    &connected.name,
                    &connected_pk.name,
                    &connected_pk.column,
                    &pk_storage,
                    &pk_repository,
                )
            })?;

        out.push(FragmentPiece::Text(format!(
            "[{alias}].[{}]",
            connected.repository
        )));
        out.push(pieces[index + 1].clone());
        out.push(FragmentPiece::Text(placeholder.marker().to_owned()));
        index += 3;
    }
    Ok(out)
}
