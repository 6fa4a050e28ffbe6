//! pathsql - Relationship-aware SQL compiler for property-path queries
//!
//! This crate compiles object-level query specifications into MySQL statements:
//! - Property-path tokens (`{author}.{name}`) embedded in query fragments
//! - Automatic join synthesis over declared entity relationships
//! - Join deduplication through a canonical join-key registry
//! - Typed parameter placeholders derived from live schema metadata
//! - Decoding of flat result rows back into nested attribute maps

pub mod data_converter;
pub mod data_storage;
pub mod entity_catalog;
pub mod query_compiler;
pub mod query_spec;
pub mod row_decoder;
pub mod schema_metadata;
pub mod value;
