// src/operators/stage.rs

//! Staging loader: newline-delimited JSON objects from object storage into a
//! staging table.
//!
//! Every object under the rendered key prefix is read and parsed before the
//! warehouse is touched. The target is then cleared and all rows are inserted
//! in one transaction.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::operators::TaskContext;
use crate::storage::jsonpaths::{self, JsonPath};
use crate::storage::ObjectSource;
use crate::types::JsonShape;
use crate::warehouse::{SqlValue, Warehouse, WarehouseError};

pub type Record = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct StageToWarehouse {
    pub table: String,
    /// Key prefix template, e.g. `log_data/{year}/{month}`.
    pub key: String,
    pub shape: JsonShape,
}

/// Parse newline-delimited JSON objects. Blank lines are skipped; `line` in
/// errors is 1-based.
pub fn parse_records(key: &str, contents: &[u8]) -> Result<Vec<Record>, TaskError> {
    let mut records = Vec::new();

    for (idx, raw) in contents.split(|b| *b == b'\n').enumerate() {
        let malformed = |reason: String| TaskError::MalformedRecord {
            key: key.to_string(),
            line: idx + 1,
            reason,
        };

        let line = std::str::from_utf8(raw).map_err(|e| malformed(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line).map_err(|e| malformed(e.to_string()))? {
            Value::Object(map) => records.push(map),
            other => {
                return Err(malformed(format!(
                    "expected a JSON object, found {}",
                    json_type(&other)
                )));
            }
        }
    }

    Ok(records)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn sql_value(value: Option<&Value>) -> SqlValue {
    value.map(SqlValue::from).unwrap_or(SqlValue::Null)
}

/// Replace the contents of `table` with `records`.
///
/// With `paths == None` (shape `auto`) the table's columns are matched to
/// top-level record keys case-insensitively, and a missing table is created
/// from the sorted union of keys, unless there are no records to take keys
/// from, in which case nothing is created. With JSONPaths the table must exist and
/// have exactly one column per path.
pub fn load_records(
    wh: &mut dyn Warehouse,
    table: &str,
    paths: Option<&[JsonPath]>,
    records: &[Record],
) -> Result<usize, TaskError> {
    let mut columns = wh
        .table_columns(table)
        .map_err(|e| TaskError::sql(format!("PRAGMA table_info({table})"), e))?;

    let rows: Vec<Vec<SqlValue>> = match paths {
        Some(paths) => {
            if columns.is_empty() {
                return Err(TaskError::sql(
                    format!("COPY {table}"),
                    WarehouseError::UnknownTable(table.to_string()),
                ));
            }
            if paths.len() != columns.len() {
                return Err(TaskError::InvalidShape {
                    location: table.to_string(),
                    reason: format!(
                        "{} jsonpaths for {} columns of '{table}'",
                        paths.len(),
                        columns.len()
                    ),
                });
            }

            records
                .iter()
                .map(|record| {
                    let record = Value::Object(record.clone());
                    paths.iter().map(|p| sql_value(p.evaluate(&record))).collect()
                })
                .collect()
        }
        None => {
            if columns.is_empty() {
                let keys: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
                if keys.is_empty() {
                    warn!(table, "no records to infer columns from; staging table not created");
                    return Ok(0);
                }
                columns = keys.into_iter().cloned().collect();
                info!(table, columns = columns.len(), "creating staging table");
                wh.create_table(table, &columns)
                    .map_err(|e| TaskError::sql(format!("CREATE TABLE {table}"), e))?;
            }

            records
                .iter()
                .map(|record| {
                    let by_lower: HashMap<String, &Value> = record
                        .iter()
                        .map(|(k, v)| (k.to_lowercase(), v))
                        .collect();
                    columns
                        .iter()
                        .map(|c| sql_value(by_lower.get(&c.to_lowercase()).copied()))
                        .collect()
                })
                .collect()
        }
    };

    wh.truncate(table)
        .map_err(|e| TaskError::sql(format!("TRUNCATE TABLE {table}"), e))?;
    wh.insert_rows(table, &columns, &rows)
        .map_err(|e| TaskError::sql(format!("COPY {table}"), e))
}

async fn load_jsonpaths(source: &ObjectSource, location: &str) -> Result<Vec<JsonPath>, TaskError> {
    let invalid = |reason: String| TaskError::InvalidShape {
        location: location.to_string(),
        reason,
    };

    let key = source
        .resolve_location(location)
        .map_err(|e| invalid(e.to_string()))?;
    let contents = source.get(&key).await.map_err(TaskError::Storage)?;
    jsonpaths::parse_document(&contents).map_err(invalid)
}

impl StageToWarehouse {
    pub async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let storage = &ctx.env.storage;
        let prefix = ctx.interval.render(&self.key);
        let location = storage.display_location(&prefix);

        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            try_number = ctx.try_number,
            table = %self.table,
            source = %location,
            "copying data from object storage to staging table"
        );

        let keys = storage.list_keys(&prefix).await.map_err(TaskError::Storage)?;
        if keys.is_empty() {
            return Err(TaskError::NoObjectsFound { location });
        }

        let paths = match &self.shape {
            JsonShape::Auto => None,
            JsonShape::Paths(loc) => Some(load_jsonpaths(storage, &ctx.interval.render(loc)).await?),
        };

        let mut records = Vec::new();
        for key in &keys {
            let contents = storage.get(key).await.map_err(TaskError::Storage)?;
            let parsed = parse_records(key.as_ref(), &contents)?;
            debug!(key = %key, records = parsed.len(), "parsed object");
            records.extend(parsed);
        }

        if records.is_empty() {
            warn!(task = %ctx.task, source = %location, objects = keys.len(), "objects contain no records");
        }

        let table = self.table.clone();
        let rows = ctx
            .env
            .warehouse
            .with_connection(move |wh| load_records(wh, &table, paths.as_deref(), &records))
            .await?;

        info!(task = %ctx.task, table = %self.table, objects = keys.len(), rows, "staging complete");
        Ok(())
    }
}
