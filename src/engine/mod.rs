// src/engine/mod.rs

//! Orchestration engine.
//!
//! Ties the DAG scheduler to the executor. The runtime reacts to:
//! - task completion events (success or a classified failure)
//! - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::FailureKind;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Final outcome of one task execution, after any retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(FailureKind),
}

/// Events flowing into the runtime from the executor and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task finished (successfully or not) in run `run_id`.
    TaskCompleted {
        task: TaskName,
        run_id: u64,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::RunReport;
pub use runtime::Runtime;
