// src/warehouse/sqlite.rs

//! `rusqlite`-backed warehouse connection.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, params_from_iter};
use tracing::debug;

use super::{SqlValue, Warehouse, WarehouseError, quote_identifier, validate_identifier};

/// One open connection to a SQLite warehouse file.
#[derive(Debug)]
pub struct SqliteWarehouse {
    conn: Connection,
}

impl SqliteWarehouse {
    /// Open (creating if needed) the database at `path`.
    ///
    /// WAL mode plus a busy timeout lets sibling tasks write to disjoint
    /// tables through separate connections without failing on lock contention.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, WarehouseError> {
        let connect_err = |source| WarehouseError::Connect {
            path: path.display().to_string(),
            source,
        };

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(connect_err)?;
        conn.busy_timeout(busy_timeout).map_err(connect_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(connect_err)?;

        debug!(path = %path.display(), "opened warehouse connection");
        Ok(Self { conn })
    }
}

impl Warehouse for SqliteWarehouse {
    fn truncate(&mut self, table: &str) -> Result<(), WarehouseError> {
        // SQLite has no TRUNCATE; an unqualified DELETE uses the truncate
        // optimisation internally.
        let sql = format!("DELETE FROM {}", quote_identifier(table)?);
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<usize, WarehouseError> {
        Ok(self.conn.execute(sql, [])?)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), WarehouseError> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn get_records(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue>>, WarehouseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for idx in 0..width {
                record.push(SqlValue::from(row.get_ref(idx)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, WarehouseError> {
        validate_identifier(table)?;
        let (schema, name) = match table.split_once('.') {
            Some((schema, name)) => (schema, name),
            None => ("main", table),
        };

        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid")?;
        let columns = stmt
            .query_map([name, schema], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), WarehouseError> {
        let cols = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>, _>>()?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(table)?,
            cols.join(", ")
        );
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let cols = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table)?,
            cols.join(", "),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(WarehouseError::RowWidth {
                        expected: columns.len(),
                        got: row.len(),
                    });
                }
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }
}
