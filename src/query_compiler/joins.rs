//! Join synthesis
//!
//! One builder per join shape plus the side table attachment for
//! properties mapped outside their entity's main repository. Each builder
//! computes the canonical join key first; when the registry already holds
//! it, the existing alias is returned and no SQL is emitted. Rendered
//! joins always start with a single leading space so the assembler can
//! concatenate them without separators.

use crate::entity_catalog::{EntityInformation, Relationship};
use crate::query_compiler::context::CompilationContext;
use crate::query_compiler::errors::CompileError;
use crate::query_compiler::registry::{column_part, join_key, JoinKind};

/// Owner-side coordinates of the hop being synthesized.
pub(crate) struct HopContext<'a, 'h> {
    pub(crate) owner_entity: &'a EntityInformation,
    pub(crate) owner_storage: &'h str,
    pub(crate) owner_repository: &'h str,
    pub(crate) owner_alias: Option<&'h str>,
    pub(crate) owned: &'a EntityInformation,
    pub(crate) owned_storage: &'h str,
}

/// Synthesizes the join for one relationship hop and returns the alias
/// the owned entity is reachable through.
pub(crate) fn synthesize(
    ctx: &mut CompilationContext,
    hop: &HopContext,
    relationship: &Relationship,
) -> Result<String, CompileError> {
    match relationship {
        Relationship::One { owner_column, .. } => one_join(ctx, hop, owner_column),
        Relationship::OneInverse {
            connect_via_property,
            ..
        } => back_reference_join(ctx, hop, connect_via_property, None),
        Relationship::OneInverseDynamic {
            connect_via_property,
            owner_name_in_property,
            ..
        } => back_reference_join(ctx, hop, connect_via_property, Some(owner_name_in_property)),
        Relationship::Many {
            connect_via_property,
            owner_name_in_property,
            ..
        } => back_reference_join(
            ctx,
            hop,
            connect_via_property,
            owner_name_in_property.as_deref(),
        ),
        Relationship::ManyViaJunction {
            junction_repository,
            ..
        } => junction_join(ctx, hop, junction_repository),
    }
}

fn soft_delete_clause(entity: &EntityInformation, alias: &str) -> Result<String, CompileError> {
    Ok(match entity.soft_delete()? {
        Some(property) => format!(" AND [{alias}].[{}] = 0", property.column),
        None => String::new(),
    })
}

/// `One`: the owner row carries the target's primary key.
fn one_join(
    ctx: &mut CompilationContext,
    hop: &HopContext,
    owner_column: &str,
) -> Result<String, CompileError> {
    let owned_pk = hop.owned.primary_key()?;
    let key = join_key(
        &column_part(hop.owner_storage, hop.owner_repository, owner_column),
        JoinKind::Left,
        &column_part(hop.owned_storage, &hop.owned.repository, &owned_pk.column),
    );
    if ctx.registry.contains(&key) {
        return Ok(ctx.registry.alias_for(&key));
    }
    let alias = ctx.registry.alias_for(&key);
    let owner_ref = ctx.owner_column_ref(
        hop.owner_alias,
        hop.owner_storage,
        hop.owner_repository,
        owner_column,
    );
    let soft = soft_delete_clause(hop.owned, &alias)?;
    let comment = ctx.comment(&alias, &key);
    let sql = format!(
        " LEFT JOIN [{}].[{}] AS [{alias}] ON {owner_ref} = [{alias}].[{}]{soft}{comment}",
        hop.owned_storage, hop.owned.repository, owned_pk.column
    );
    ctx.push_join(&alias, sql);
    Ok(alias)
}

/// `OneInverse`, `OneInverseDynamic` and `Many` share one shape: target
/// rows carry the owner's primary key in `connect_via_property`,
/// optionally discriminated by the owner's entity name. The discriminator
/// column replaces the primary key column in the join key so two
/// relationships differing only by discriminator stay distinct.
fn back_reference_join(
    ctx: &mut CompilationContext,
    hop: &HopContext,
    connect_via_property: &str,
    owner_name_in_property: Option<&str>,
) -> Result<String, CompileError> {
    let owner_pk = hop.owner_entity.primary_key()?;
    let via = hop.owned.property(connect_via_property)?;
    let discriminator = owner_name_in_property
        .map(|name| hop.owned.property(name))
        .transpose()?;
    let owner_column = match discriminator {
        Some(property) => &property.column,
        None => &owner_pk.column,
    };
    let key = join_key(
        &column_part(hop.owner_storage, hop.owner_repository, owner_column),
        JoinKind::Left,
        &column_part(hop.owned_storage, &hop.owned.repository, &via.column),
    );
    if ctx.registry.contains(&key) {
        return Ok(ctx.registry.alias_for(&key));
    }
    let alias = ctx.registry.alias_for(&key);
    let owner_ref = ctx.owner_column_ref(
        hop.owner_alias,
        hop.owner_storage,
        hop.owner_repository,
        &owner_pk.column,
    );
    let mut on_clause = format!("[{alias}].[{}] = {owner_ref}", via.column);
    if let Some(property) = discriminator {
        on_clause.push_str(&format!(
            " AND [{alias}].[{}] = '{}'",
            property.column, hop.owner_entity.name
        ));
    }
    let soft = soft_delete_clause(hop.owned, &alias)?;
    let comment = ctx.comment(&alias, &key);
    let sql = format!(
        " LEFT JOIN [{}].[{}] AS [{alias}] ON {on_clause}{soft}{comment}",
        hop.owned_storage, hop.owned.repository
    );
    ctx.push_join(&alias, sql);
    Ok(alias)
}

/// `ManyViaJunction`: two chained joins through a junction table whose
/// columns are named after the repositories they reference. The junction
/// table itself stays unaliased; the returned alias names the owned
/// table. Both legs burn a registry slot so alias numbering stays stable
/// across reuse.
fn junction_join(
    ctx: &mut CompilationContext,
    hop: &HopContext,
    junction_repository: &str,
) -> Result<String, CompileError> {
    let owner_pk = hop.owner_entity.primary_key()?;
    let owned_pk = hop.owned.primary_key()?;
    let (junction_storage, junction_repository) =
        ctx.catalog.split_repository_ref(junction_repository);

    let owner_part = column_part(hop.owner_storage, hop.owner_repository, &owner_pk.column);
    let owned_part = column_part(hop.owned_storage, &hop.owned.repository, &owned_pk.column);
    let owned_leg = join_key(
        &column_part(&junction_storage, &junction_repository, &hop.owned.repository),
        JoinKind::Left,
        &owned_part,
    );
    let owner_leg = join_key(
        &column_part(&junction_storage, &junction_repository, hop.owner_repository),
        JoinKind::Left,
        &owner_part,
    );
    let _ = ctx.registry.alias_for(&owned_leg);
    let _ = ctx.registry.alias_for(&owner_leg);
    let key = join_key(&owned_leg, JoinKind::Left, &owner_leg);
    if ctx.registry.contains(&key) {
        return Ok(ctx.registry.alias_for(&key));
    }
    let alias = ctx.registry.alias_for(&key);
    let owner_ref = ctx.owner_column_ref(
        hop.owner_alias,
        hop.owner_storage,
        hop.owner_repository,
        &owner_pk.column,
    );
    let soft = soft_delete_clause(hop.owned, &alias)?;
    let comment = ctx.comment(&alias, &key);
    let sql = format!(
        " LEFT JOIN [{junction_storage}].[{junction_repository}] ON [{junction_storage}].[{junction_repository}].[{}] = {owner_ref} LEFT JOIN [{}].[{}] AS [{alias}] ON [{junction_storage}].[{junction_repository}].[{}] = [{alias}].[{}]{soft}{comment}",
        hop.owner_repository,
        hop.owned_storage,
        hop.owned.repository,
        hop.owned.repository,
        owned_pk.column
    );
    ctx.push_join(&alias, sql);
    Ok(alias)
}

/// Attaches INNER JOINs for every repository the base entity spreads
/// properties into beyond its main one, keyed on a shared primary key
/// column. Side tables come first in the join clause, in property
/// declaration order.
pub(crate) fn attach_side_tables(
    ctx: &mut CompilationContext,
    entity: &EntityInformation,
) -> Result<(), CompileError> {
    let catalog = ctx.catalog;
    let entity_storage = catalog.storage_for_entity(entity).to_owned();
    let pk = entity.primary_key()?;
    let base_part = column_part(&entity_storage, &entity.repository, &pk.column);
    for property in &entity.properties {
        let property_storage = catalog.storage_for_property(entity, property).to_owned();
        let property_repository = catalog.repository_for_property(entity, property).to_owned();
        if property_storage == entity_storage && property_repository == entity.repository {
            continue;
        }
        let table = format!("{property_storage}.{property_repository}");
        if ctx.options.alias_tables && ctx.junction_aliases.contains_key(&table) {
            continue;
        }
        let key = join_key(
            &base_part,
            JoinKind::Inner,
            &column_part(&property_storage, &property_repository, &pk.column),
        );
        if ctx.registry.contains(&key) {
            continue;
        }
        let alias = ctx.registry.alias_for(&key);
        let sql = if ctx.options.alias_tables {
            ctx.junction_aliases.insert(table, alias.clone());
            format!(
                " INNER JOIN [{property_storage}].[{property_repository}] AS [{alias}] ON [{alias}].[{}] = [t0].[{}]",
                pk.column, pk.column
            )
        } else {
            format!(
                " INNER JOIN [{property_storage}].[{property_repository}] ON [{property_storage}].[{property_repository}].[{}] = [{entity_storage}].[{}].[{}]",
                pk.column, entity.repository, pk.column
            )
        };
        ctx.push_join(&alias, sql);
    }
    Ok(())
}
