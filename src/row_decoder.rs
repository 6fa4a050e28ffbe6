//! Result row decoder
//!
//! Reshapes flat joined rows into nested attribute maps. A select alias
//! like `author.name` becomes `{"author": {"name": …}}`; when a joined
//! row's primary key comes back null the whole related subtree is nulled
//! out, since the LEFT JOIN found no row. Export conversions registered
//! in the schema metadata are applied per leaf.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::data_converter::{ConvertError, DataConverter};
use crate::entity_catalog::{CatalogError, EntityCatalog, EntityInformation, PropertyInformation};
use crate::schema_metadata::{SchemaError, SchemaMetadataResolver};

/// Errors raised while decoding result rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Result column '{column}' matches no select alias")]
    UnknownAlias { column: String },

    #[error("Result column '{column}' names no property reachable from '{entity}'")]
    UnknownColumn { column: String, entity: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl DecodeError {
    fn unknown_column(column: &str, entity: &EntityInformation) -> Self {
        DecodeError::UnknownColumn {
            column: column.to_owned(),
            entity: entity.name.clone(),
        }
    }
}

/// Decodes rows produced by compiled queries back into nested maps.
pub struct RowDecoder {
    catalog: Arc<EntityCatalog>,
    resolver: Arc<SchemaMetadataResolver>,
    converter: Arc<dyn DataConverter>,
}

impl RowDecoder {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        resolver: Arc<SchemaMetadataResolver>,
        converter: Arc<dyn DataConverter>,
    ) -> Self {
        RowDecoder {
            catalog,
            resolver,
            converter,
        }
    }

    /// Decodes every row for `entity_name`. `column_aliases` is the map
    /// from the compiled query; empty outside short alias mode.
    pub fn decode_rows(
        &self,
        entity_name: &str,
        column_aliases: &HashMap<String, String>,
        rows: &[Map<String, Value>],
    ) -> Result<Vec<Value>, DecodeError> {
        let entity = self.catalog.entity(entity_name)?;
        rows.iter()
            .map(|row| self.decode_row(entity, column_aliases, row))
            .collect()
    }

    fn decode_row(
        &self,
        entity: &EntityInformation,
        column_aliases: &HashMap<String, String>,
        row: &Map<String, Value>,
    ) -> Result<Value, DecodeError> {
        let mut root = Map::new();
        let mut pruned: Vec<Vec<String>> = Vec::new();
        for (column, value) in row {
            let logical = if column_aliases.is_empty() {
                column.as_str()
            } else {
                column_aliases
                    .get(column)
                    .map(String::as_str)
                    .ok_or_else(|| DecodeError::UnknownAlias {
                        column: column.clone(),
                    })?
            };
            let segments: Vec<&str> = logical.split('.').collect();
            let mut current = entity;
            for segment in &segments[..segments.len() - 1] {
                let property = current
                    .find_property(segment)
                    .ok_or_else(|| DecodeError::unknown_column(logical, current))?;
                let relationship = property
                    .relationship
                    .as_ref()
                    .ok_or_else(|| DecodeError::unknown_column(logical, current))?;
                current = self.catalog.entity(relationship.target())?;
            }
            let leaf_name = segments[segments.len() - 1];
            let leaf = current
                .find_property(leaf_name)
                .ok_or_else(|| DecodeError::unknown_column(logical, current))?;
            let converted = self.export_value(current, leaf, value)?;
            if segments.len() > 1 && converted.is_null() && leaf.name == current.primary_property {
                pruned.push(
                    segments[..segments.len() - 1]
                        .iter()
                        .map(|segment| (*segment).to_owned())
                        .collect(),
                );
            }
            insert_nested(&mut root, &segments, converted);
        }
        pruned.sort_by_key(Vec::len);
        for prefix in &pruned {
            null_subtree(&mut root, prefix);
        }
        Ok(Value::Object(root))
    }

    /// Applies the column's export conversion. Null values of nullable
    /// properties pass through untouched.
    fn export_value(
        &self,
        entity: &EntityInformation,
        property: &PropertyInformation,
        value: &Value,
    ) -> Result<Value, DecodeError> {
        let storage = self.catalog.storage_for_property(entity, property);
        let repository = self.catalog.repository_for_property(entity, property);
        let schema = self.resolver.resolve(&self.catalog, entity)?;
        let conversion = schema
            .column(storage, repository, &property.column)
            .and_then(|column| column.export_conversion.clone());
        match conversion {
            Some(conversion) if !(value.is_null() && property.nullable) => {
                Ok(self.converter.export(&conversion, value, property)?)
            }
            _ => Ok(value.clone()),
        }
    }
}

/// Inserts a value at a dotted path, materializing objects along the way.
/// Nested structure wins over scalars when the same path carries both.
fn insert_nested(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let mut cursor = root;
    for segment in &segments[..segments.len() - 1] {
        let entry = cursor
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !matches!(entry, Value::Object(_)) {
            *entry = Value::Object(Map::new());
        }
        cursor = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    let leaf = segments[segments.len() - 1];
    if matches!(cursor.get(leaf), Some(Value::Object(_))) {
        return;
    }
    cursor.insert(leaf.to_owned(), value);
}

/// Replaces the subtree at `prefix` with null. Silently stops when an
/// ancestor was already nulled.
fn null_subtree(root: &mut Map<String, Value>, prefix: &[String]) {
    let mut cursor = root;
    for segment in &prefix[..prefix.len() - 1] {
        cursor = match cursor.get_mut(segment) {
            Some(Value::Object(map)) => map,
            _ => return,
        };
    }
    if let Some(entry) = cursor.get_mut(&prefix[prefix.len() - 1]) {
        *entry = Value::Null;
    }
}
