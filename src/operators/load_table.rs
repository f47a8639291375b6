// src/operators/load_table.rs

//! Fact and dimension loaders.
//!
//! Both render `INSERT INTO <table> <select>`. The fact loader only ever
//! appends. The dimension loader truncates first when `replace` is set; the
//! truncate and the insert are separate statements, so a failed insert leaves
//! the dimension empty rather than stale.

use tracing::{error, info};

use crate::errors::TaskError;
use crate::operators::TaskContext;
use crate::warehouse::{insert_select_statement, Warehouse};

#[derive(Debug, Clone)]
pub struct LoadFact {
    pub table: String,
    pub select: String,
}

#[derive(Debug, Clone)]
pub struct LoadDimension {
    pub table: String,
    pub select: String,
    /// Truncate before inserting (default `true`).
    pub replace: bool,
}

/// Run `INSERT INTO table select`, returning the number of inserted rows.
pub fn insert_select(
    wh: &mut dyn Warehouse,
    table: &str,
    select: &str,
) -> Result<usize, TaskError> {
    let statement =
        insert_select_statement(table, select).map_err(|e| TaskError::sql(select, e))?;

    wh.execute(&statement).map_err(|e| {
        error!(table, statement = %statement, error = %e, "insert statement failed");
        TaskError::sql(statement.clone(), e)
    })
}

/// Append the result of `select` to a fact table.
pub fn load_fact(wh: &mut dyn Warehouse, table: &str, select: &str) -> Result<usize, TaskError> {
    insert_select(wh, table, select)
}

/// Load a dimension table, truncating it first when `replace` is set.
pub fn load_dimension(
    wh: &mut dyn Warehouse,
    table: &str,
    select: &str,
    replace: bool,
) -> Result<usize, TaskError> {
    if replace {
        info!(table, "removing data from dimension table");
        wh.truncate(table).map_err(|e| {
            error!(table, error = %e, "truncate failed");
            TaskError::sql(format!("TRUNCATE TABLE {table}"), e)
        })?;
    }

    insert_select(wh, table, select)
}

impl LoadFact {
    pub async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            try_number = ctx.try_number,
            table = %self.table,
            "inserting into fact table"
        );

        let table = self.table.clone();
        let select = self.select.clone();
        let rows = ctx
            .env
            .warehouse
            .with_connection(move |wh| load_fact(wh, &table, &select))
            .await?;

        info!(task = %ctx.task, table = %self.table, rows, "fact table loaded");
        Ok(())
    }
}

impl LoadDimension {
    pub async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            try_number = ctx.try_number,
            table = %self.table,
            replace = self.replace,
            "inserting into dimension table"
        );

        let table = self.table.clone();
        let select = self.select.clone();
        let replace = self.replace;
        let rows = ctx
            .env
            .warehouse
            .with_connection(move |wh| load_dimension(wh, &table, &select, replace))
            .await?;

        info!(task = %ctx.task, table = %self.table, rows, "dimension table loaded");
        Ok(())
    }
}
