//! Typed statement placeholders
//!
//! Every parameter position compiled from a property path is rewritten
//! to a typed marker derived from the column it binds against, so the
//! driver layer knows how to encode the value without guessing from the
//! Rust type.

use serde::{Deserialize, Serialize};

/// Typed parameter marker, keyed by column type family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    Integer,
    Float,
    Temporal,
    Text,
    Binary,
}

impl Placeholder {
    /// Marker text emitted into compiled statements.
    pub fn marker(&self) -> &'static str {
        match self {
            Placeholder::Integer => "%i",
            Placeholder::Float => "%f",
            Placeholder::Temporal => "%t",
            Placeholder::Text => "%s",
            Placeholder::Binary => "%bin",
        }
    }

    /// Maps a reported column type to its placeholder.
    ///
    /// Only the type family matters: `int(11) unsigned` and `int` both
    /// map to [`Placeholder::Integer`]. Unknown families yield `None`.
    pub fn for_column_type(column_type: &str) -> Option<Placeholder> {
        match column_type_family(column_type).as_str() {
            "int" | "tinyint" | "smallint" | "mediumint" | "bigint" => Some(Placeholder::Integer),
            "float" | "double" | "decimal" => Some(Placeholder::Float),
            "date" | "datetime" | "timestamp" | "time" | "year" => Some(Placeholder::Temporal),
            "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" | "enum" => {
                Some(Placeholder::Text)
            }
            "blob" | "tinyblob" | "mediumblob" | "longblob" => Some(Placeholder::Binary),
            _ => None,
        }
    }
}

/// Extracts the type family from a reported column type: the leading
/// alphabetic run, lowercased. `int(11) unsigned` becomes `int`.
pub fn column_type_family(column_type: &str) -> String {
    column_type
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}
