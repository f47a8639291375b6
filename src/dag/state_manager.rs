// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;
use crate::schedule::DataInterval;

pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DagGraph, tasks: &'a mut HashMap<TaskName, TaskInfo>) -> Self {
        Self { graph, tasks }
    }

    /// Put every task of the DAG into `Pending` for a fresh run.
    pub fn reset_all_pending(&mut self) {
        for info in self.tasks.values_mut() {
            info.run_state = Some(RunState::Pending);
            info.failure = None;
        }
    }

    /// Mark every transitive dependent of a failed task as `UpstreamFailed`.
    ///
    /// Returns the newly marked tasks, excluding `failed_task` itself.
    pub fn mark_dependents_upstream_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };

            match info.run_state {
                Some(RunState::Pending) => {
                    info.run_state = Some(RunState::UpstreamFailed);
                    debug!(task = %info.name, upstream = %failed_task, "marked UpstreamFailed");
                    newly_failed.push(info.name.clone());
                    stack.extend(self.graph.dependents_of(&name).iter().cloned());
                }
                Some(RunState::Running) => {
                    // Cannot happen: a running task had all deps succeed.
                    warn!(task = %info.name, upstream = %failed_task, "dependent already running");
                }
                _ => {}
            }
        }

        newly_failed
    }

    /// Collect `Pending` tasks whose dependencies all succeeded, mark them
    /// `Running`, and return them in declaration order.
    pub fn collect_new_ready_tasks(
        &mut self,
        run_id: u64,
        interval: DataInterval,
    ) -> Vec<ScheduledTask> {
        let tasks: &HashMap<TaskName, TaskInfo> = &*self.tasks;
        let checker = ReadOnlyStateManager::new(tasks);
        let candidates: Vec<TaskName> = self
            .graph
            .tasks()
            .filter(|name| {
                tasks.get(*name).is_some_and(|info| {
                    info.run_state == Some(RunState::Pending)
                        && checker.deps_satisfied_for_info(info)
                })
            })
            .map(str::to_string)
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                info!(
                    task = %info.name,
                    run_id,
                    operator = info.operator.kind(),
                    "dependencies satisfied; scheduling task"
                );
                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(info, run_id, interval));
            }
        }

        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks
            .values()
            .all(|info| info.run_state.is_none_or(RunState::is_terminal))
    }
}

/// Read-only dependency check over the tasks map.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A task may start only when every direct dependency succeeded in the
    /// current run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => dep.run_state == Some(RunState::DoneSuccess),
            None => {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                false
            }
        })
    }
}
