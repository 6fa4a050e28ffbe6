//! Join deduplication registry
//!
//! Every synthesized join is identified by a canonical key built from the
//! two column endpoints it connects. The registry hands out one table
//! alias per distinct key, so a property path that is traversed several
//! times within a query reuses the join instead of stacking duplicates.

use std::collections::HashMap;

use crate::query_compiler::errors::CompileError;

/// Join flavor used when building canonical keys and SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Inner,
}

impl JoinKind {
    /// Token used inside canonical join keys.
    pub fn token(&self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT_JOIN",
            JoinKind::Inner => "INNER_JOIN",
        }
    }

    /// SQL keyword for the join.
    pub fn sql(&self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Inner => "INNER JOIN",
        }
    }
}

/// Canonical identifier of one column endpoint: `storage:repository:column`.
pub fn column_part(storage: &str, repository: &str, column: &str) -> String {
    format!("{storage}:{repository}:{column}")
}

/// Canonical identifier of a join between two endpoints.
pub fn join_key(owner_part: &str, kind: JoinKind, owned_part: &str) -> String {
    format!("{owner_part}->{}->{owned_part}", kind.token())
}

/// Maps canonical join keys to the `t{N}` aliases minted for them.
///
/// Aliases are numbered from the registry's starting counter; `t0` is
/// reserved for the base table when table aliasing is enabled.
#[derive(Debug, Default)]
pub struct JoinKeyRegistry {
    aliases: HashMap<String, String>,
    keys_by_alias: HashMap<String, String>,
    counter: usize,
}

impl JoinKeyRegistry {
    pub fn new() -> Self {
        JoinKeyRegistry::default()
    }

    /// Whether a join with this key has already been registered.
    pub fn contains(&self, key: &str) -> bool {
        self.aliases.contains_key(key)
    }

    /// Returns the alias for `key`, minting a fresh `t{N}` on first use.
    pub fn alias_for(&mut self, key: &str) -> String {
        if let Some(alias) = self.aliases.get(key) {
            return alias.clone();
        }
        self.counter += 1;
        let alias = format!("t{}", self.counter);
        log::debug!("Minted join alias '{alias}' for '{key}'");
        self.aliases.insert(key.to_owned(), alias.clone());
        self.keys_by_alias.insert(alias.clone(), key.to_owned());
        alias
    }

    /// Looks up the canonical key an alias was minted for. Fails when the
    /// alias was never issued within this compilation.
    pub fn key_for_alias(&self, alias: &str) -> Result<&str, CompileError> {
        self.keys_by_alias
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| CompileError::UnknownAlias {
                alias: alias.to_owned(),
            })
    }

    /// Number of distinct keys registered so far.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
