//! Statement execution contract
//!
//! The storage facade never talks to a database driver directly. It hands
//! compiled statement text plus ordered parameters to a
//! [`StatementExecutor`], which owns marker substitution, connections and
//! transactions. Tests substitute a mock.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::value::SqlValue;

/// Driver-side failure, already stringified by the implementation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Statement execution failed: {message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        ExecutionError {
            message: message.into(),
        }
    }
}

/// Executes compiled statements. Statement text carries typed markers
/// (`%i`, `%f`, `%t`, `%s`, `%bin`) which implementations pair with the
/// parameters in order.
pub trait StatementExecutor: Send + Sync {
    /// Runs a SELECT and returns its rows as ordered column maps.
    fn fetch_rows(
        &self,
        statement: &str,
        parameters: &[SqlValue],
    ) -> Result<Vec<Map<String, Value>>, ExecutionError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&self, statement: &str, parameters: &[SqlValue]) -> Result<u64, ExecutionError>;

    /// Key generated by the most recent INSERT, if any.
    fn last_insert_id(&self) -> Result<Option<u64>, ExecutionError>;

    fn begin(&self) -> Result<(), ExecutionError>;

    fn commit(&self) -> Result<(), ExecutionError>;

    fn rollback(&self) -> Result<(), ExecutionError>;
}
