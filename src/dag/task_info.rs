// src/dag/task_info.rs

//! Task metadata and per-run state.

use std::sync::Arc;

use crate::config::model::RetryPolicy;
use crate::engine::TaskName;
use crate::operators::Operator;
use crate::schedule::DataInterval;
use crate::types::FailureKind;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of the run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    DoneSuccess,
    /// The task itself failed (after any retries).
    DoneFailed,
    /// Never executed because a transitive dependency failed.
    UpstreamFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRunState {
    /// No run has been started yet.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
    UpstreamFailed,
}

impl TaskRunState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskRunState::NotInRun => "not_in_run",
            TaskRunState::Pending => "pending",
            TaskRunState::Running => "running",
            TaskRunState::DoneSuccess => "success",
            TaskRunState::DoneFailed => "failed",
            TaskRunState::UpstreamFailed => "upstream_failed",
        }
    }
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
            Some(RunState::UpstreamFailed) => TaskRunState::UpstreamFailed,
        }
    }
}

/// Static task information derived from config, plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub operator: Arc<Operator>,
    pub retry: RetryPolicy,
    /// Direct dependencies (`after = [...]`).
    pub deps: Vec<TaskName>,

    /// `None` until the first run starts.
    pub run_state: Option<RunState>,
    /// Why the task failed in the current run, if it did.
    pub failure: Option<FailureKind>,
}

impl TaskInfo {
    pub fn new(
        name: TaskName,
        operator: Operator,
        retry: RetryPolicy,
        deps: Vec<TaskName>,
    ) -> Self {
        Self {
            name,
            operator: Arc::new(operator),
            retry,
            deps,
            run_state: None,
            failure: None,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub operator: Arc<Operator>,
    pub retry: RetryPolicy,
    /// All tasks of one DAG run share the same `run_id`.
    pub run_id: u64,
    pub interval: DataInterval,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64, interval: DataInterval) -> Self {
        Self {
            name: info.name.clone(),
            operator: Arc::clone(&info.operator),
            retry: info.retry,
            run_id,
            interval,
        }
    }
}
