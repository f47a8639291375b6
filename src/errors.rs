// src/errors.rs

//! Crate-wide error types.
//!
//! - [`LoaddagError`] covers startup concerns: config, DAG shape, schedule,
//!   opening the warehouse or the object store.
//! - [`TaskError`] is what an operator returns when a task fails. Every
//!   variant maps onto one [`FailureKind`], which is what the run engine logs
//!   and records in the run report.

use thiserror::Error;

use crate::storage::StorageError;
use crate::types::FailureKind;
use crate::warehouse::{SqlValue, WarehouseError};

#[derive(Error, Debug)]
pub enum LoaddagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Schedule error: {0}")]
    ScheduleError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LoaddagError>;

/// Outcome of a quality gate that did not pass.
///
/// The two variants must stay distinguishable: `NoResult` is a query or
/// configuration problem, `Mismatch` means the data is wrong.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityError {
    #[error("check produced no result: `{statement}` returned no rows")]
    NoResult { statement: String },

    #[error("check failed: expected {expected}, got {actual}")]
    Mismatch { expected: SqlValue, actual: SqlValue },
}

/// Failure of a single task execution.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The object store could not be reached or answered with an error.
    #[error("object storage unavailable: {0}")]
    Storage(#[source] StorageError),

    /// No object matched the staging key prefix.
    #[error("no objects found under '{location}'")]
    NoObjectsFound { location: String },

    /// A staged record does not conform to the shape hint.
    #[error("malformed record in '{key}' line {line}: {reason}")]
    MalformedRecord {
        key: String,
        line: usize,
        reason: String,
    },

    /// The JSONPaths document is missing or invalid.
    #[error("invalid json shape '{location}': {reason}")]
    InvalidShape { location: String, reason: String },

    /// A warehouse statement failed; `statement` is the SQL that was sent.
    #[error("statement failed: {source}")]
    Sql {
        statement: String,
        #[source]
        source: WarehouseError,
    },

    #[error(transparent)]
    Quality(#[from] QualityError),
}

impl TaskError {
    pub fn sql(statement: impl Into<String>, source: WarehouseError) -> Self {
        TaskError::Sql {
            statement: statement.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Storage(err) if err.is_not_found() => FailureKind::MalformedInput,
            TaskError::Storage(_) => FailureKind::Connectivity,
            TaskError::NoObjectsFound { .. }
            | TaskError::MalformedRecord { .. }
            | TaskError::InvalidShape { .. } => FailureKind::MalformedInput,
            TaskError::Sql { source, .. } if source.is_connectivity() => FailureKind::Connectivity,
            TaskError::Sql { .. } => FailureKind::MalformedInput,
            TaskError::Quality(QualityError::NoResult { .. }) => FailureKind::MalformedInput,
            TaskError::Quality(QualityError::Mismatch { .. }) => FailureKind::DataQuality,
        }
    }

    /// Only connectivity failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Connectivity
    }
}

impl From<WarehouseError> for TaskError {
    fn from(source: WarehouseError) -> Self {
        TaskError::Sql {
            statement: String::new(),
            source,
        }
    }
}
