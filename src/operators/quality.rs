// src/operators/quality.rs

//! Single scalar data-quality assertion.

use tracing::{error, info};

use crate::errors::{QualityError, TaskError};
use crate::operators::TaskContext;
use crate::warehouse::{SqlValue, Warehouse};

#[derive(Debug, Clone)]
pub struct QualityCheck {
    pub sql: String,
    pub expected: SqlValue,
}

/// Run `sql` and compare the first column of the first row with `expected`.
///
/// An empty result is reported as [`QualityError::NoResult`] without any
/// comparison; a different value as [`QualityError::Mismatch`].
pub fn run_check(
    wh: &mut dyn Warehouse,
    sql: &str,
    expected: &SqlValue,
) -> Result<SqlValue, TaskError> {
    let records = wh.get_records(sql).map_err(|e| {
        error!(statement = %sql, error = %e, "quality statement failed");
        TaskError::sql(sql, e)
    })?;

    let Some(actual) = records.first().and_then(|row| row.first()) else {
        return Err(QualityError::NoResult {
            statement: sql.trim().to_string(),
        }
        .into());
    };

    if !actual.matches(expected) {
        return Err(QualityError::Mismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        }
        .into());
    }

    Ok(actual.clone())
}

impl QualityCheck {
    pub async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        info!(
            task = %ctx.task,
            run_id = ctx.run_id,
            try_number = ctx.try_number,
            "running data quality check"
        );

        let sql = self.sql.clone();
        let expected = self.expected.clone();
        let value = ctx
            .env
            .warehouse
            .with_connection(move |wh| run_check(wh, &sql, &expected))
            .await?;

        info!(task = %ctx.task, value = %value, "data quality check passed");
        Ok(())
    }
}
