// src/operators/mod.rs

//! Task operators.
//!
//! An [`Operator`] is the tagged variant a task executes:
//!
//! - [`stage`]: object storage → staging table.
//! - [`load_table`]: `INSERT INTO ... SELECT` for fact and dimension tables.
//! - [`quality`]: scalar assertion against the warehouse.
//!
//! Operators never retry and never swallow errors; the task runner decides
//! what happens next based on [`TaskError::kind`].

pub mod context;
pub mod load_table;
pub mod quality;
pub mod stage;

use tracing::debug;

use crate::config::model::OperatorConfig;
use crate::errors::{LoaddagError, Result, TaskError};

pub use context::{TaskContext, TaskEnv};
pub use load_table::{LoadDimension, LoadFact};
pub use quality::QualityCheck;
pub use stage::StageToWarehouse;

#[derive(Debug, Clone)]
pub enum Operator {
    Noop,
    Stage(StageToWarehouse),
    LoadFact(LoadFact),
    LoadDimension(LoadDimension),
    QualityCheck(QualityCheck),
}

impl Operator {
    /// Build the operator described by a task's config, resolving built-in
    /// query names to SQL.
    pub fn from_config(cfg: &OperatorConfig) -> Result<Self> {
        let select = || -> Result<String> {
            cfg.resolve_select()
                .map_err(LoaddagError::ConfigError)?
                .ok_or_else(|| LoaddagError::ConfigError("missing select".to_string()))
        };

        Ok(match cfg {
            OperatorConfig::Noop => Operator::Noop,
            OperatorConfig::Stage { table, key, json } => Operator::Stage(StageToWarehouse {
                table: table.clone(),
                key: key.clone(),
                shape: json.clone(),
            }),
            OperatorConfig::LoadFact { table, .. } => Operator::LoadFact(LoadFact {
                table: table.clone(),
                select: select()?,
            }),
            OperatorConfig::LoadDimension { table, replace, .. } => {
                Operator::LoadDimension(LoadDimension {
                    table: table.clone(),
                    select: select()?,
                    replace: *replace,
                })
            }
            OperatorConfig::QualityCheck { sql, expected } => {
                Operator::QualityCheck(QualityCheck {
                    sql: sql.clone(),
                    expected: expected.clone(),
                })
            }
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Noop => "noop",
            Operator::Stage(_) => "stage",
            Operator::LoadFact(_) => "load_fact",
            Operator::LoadDimension(_) => "load_dimension",
            Operator::QualityCheck(_) => "quality_check",
        }
    }

    /// One-line description for plan output.
    pub fn describe(&self) -> String {
        match self {
            Operator::Noop => "noop".to_string(),
            Operator::Stage(op) => {
                format!("stage {} <- {} (json: {})", op.table, op.key, op.shape)
            }
            Operator::LoadFact(op) => format!("load_fact {} (append)", op.table),
            Operator::LoadDimension(op) => format!(
                "load_dimension {} ({})",
                op.table,
                if op.replace { "truncate + insert" } else { "append" }
            ),
            Operator::QualityCheck(op) => format!("quality_check expects {}", op.expected),
        }
    }

    pub async fn execute(&self, ctx: &TaskContext) -> std::result::Result<(), TaskError> {
        match self {
            Operator::Noop => {
                debug!(task = %ctx.task, run_id = ctx.run_id, "noop task");
                Ok(())
            }
            Operator::Stage(op) => op.execute(ctx).await,
            Operator::LoadFact(op) => op.execute(ctx).await,
            Operator::LoadDimension(op) => op.execute(ctx).await,
            Operator::QualityCheck(op) => op.execute(ctx).await,
        }
    }
}
