// src/engine/report.rs

use std::collections::BTreeMap;
use std::fmt;

use crate::dag::TaskRunState;
use crate::engine::TaskName;
use crate::schedule::DataInterval;
use crate::types::FailureKind;

/// What happened to every task of one DAG run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: u64,
    pub interval: Option<DataInterval>,
    pub states: BTreeMap<TaskName, TaskRunState>,
    /// Tasks that failed themselves, with their failure classification.
    pub failures: BTreeMap<TaskName, FailureKind>,
    /// The run was stopped by a shutdown request before finishing.
    pub interrupted: bool,
}

impl RunReport {
    /// Every task succeeded and the run was not interrupted.
    pub fn succeeded(&self) -> bool {
        !self.interrupted
            && self
                .states
                .values()
                .all(|state| *state == TaskRunState::DoneSuccess)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.states.get(task).copied()
    }

    /// Tasks in the given state, in name order.
    pub fn tasks_in(&self, state: TaskRunState) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Tasks that were still pending or running when the run ended.
    pub fn unfinished(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, TaskRunState::Pending | TaskRunState::Running))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.interrupted {
            "interrupted"
        } else if self.succeeded() {
            "success"
        } else {
            "failed"
        };

        write!(f, "run {} {}", self.run_id, status)?;
        if let Some(interval) = &self.interval {
            write!(f, " {interval}")?;
        }
        for (task, state) in &self.states {
            write!(f, "\n  {task}: {}", state.as_str())?;
            if let Some(kind) = self.failures.get(task) {
                write!(f, " ({kind})")?;
            }
        }
        Ok(())
    }
}
