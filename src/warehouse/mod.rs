// src/warehouse/mod.rs

//! Warehouse access.
//!
//! - [`Warehouse`] is the narrow surface operators need: truncate, execute,
//!   fetch records, bulk-insert rows, inspect a table's columns.
//! - [`sqlite`] implements it on top of `rusqlite`.
//! - [`pool`] hands out at most one connection per task execution and takes
//!   it back when the guard is dropped.
//! - [`value`] holds the dynamically typed [`SqlValue`].

pub mod pool;
pub mod sqlite;
pub mod value;

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub use pool::{PooledConnection, WarehousePool};
pub use sqlite::SqliteWarehouse;
pub use value::SqlValue;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("cannot open warehouse at '{path}': {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("warehouse connection pool is closed")]
    PoolClosed,

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("invalid table identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("row has {got} values but {expected} columns were given")]
    RowWidth { expected: usize, got: usize },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("warehouse worker failed: {0}")]
    Worker(String),
}

impl WarehouseError {
    /// Whether the error means "could not talk to the warehouse" rather than
    /// "the warehouse rejected the statement".
    pub fn is_connectivity(&self) -> bool {
        match self {
            WarehouseError::Connect { .. }
            | WarehouseError::PoolClosed
            | WarehouseError::Worker(_) => true,
            WarehouseError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}

/// Operations the loaders issue against the warehouse.
///
/// Everything here is blocking; async callers go through
/// [`WarehousePool::with_connection`].
pub trait Warehouse: Send {
    /// Remove every row of `table`, keeping its schema.
    fn truncate(&mut self, table: &str) -> Result<(), WarehouseError>;

    /// Execute a statement that returns no rows; yields the affected row count.
    fn execute(&mut self, sql: &str) -> Result<usize, WarehouseError>;

    /// Execute several `;`-separated statements.
    fn execute_batch(&mut self, sql: &str) -> Result<(), WarehouseError>;

    /// Run a query and return every row.
    fn get_records(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue>>, WarehouseError>;

    /// Column names of `table` in declaration order; empty if the table does
    /// not exist.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, WarehouseError>;

    /// Create `table` with untyped columns.
    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), WarehouseError>;

    /// Insert all `rows` into `columns` of `table` in one transaction.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<usize, WarehouseError>;
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .unwrap_or_else(|e| panic!("identifier regex must compile: {e}"))
    })
}

/// Check that `name` is a plain (optionally schema-qualified) identifier.
pub fn validate_identifier(name: &str) -> Result<(), WarehouseError> {
    if identifier_regex().is_match(name) {
        Ok(())
    } else {
        Err(WarehouseError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate and double-quote an identifier, e.g. `time` -> `"time"` and
/// `dw.users` -> `"dw"."users"`.
pub fn quote_identifier(name: &str) -> Result<String, WarehouseError> {
    validate_identifier(name)?;
    Ok(name
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

/// Render the statement used by both table loaders.
pub fn insert_select_statement(table: &str, select: &str) -> Result<String, WarehouseError> {
    Ok(format!(
        "INSERT INTO {}\n{}",
        quote_identifier(table)?,
        select.trim().trim_end_matches(';')
    ))
}
