// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{RunReport, TaskName, TaskOutcome};
use crate::errors::Result;
use crate::operators::Operator;
use crate::schedule::DataInterval;

/// Immutable DAG plus the mutable state of the current run.
///
/// Responsible for:
/// - starting a run over one data interval (every task `Pending`)
/// - deciding when a task is ready (all direct deps succeeded)
/// - recording success / failure reported by the executor
/// - marking transitive dependents of a failure `UpstreamFailed`
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Active run, or `None` when idle.
    current_run_id: Option<u64>,
    /// Interval of the latest run (kept after it finishes for reporting).
    interval: Option<DataInterval>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`], compiling each
    /// task's operator.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let graph = DagGraph::from_config(cfg);

        let mut tasks = HashMap::new();
        for (name, tc) in cfg.task.iter() {
            let deps = graph.dependencies_of(name).to_vec();
            let operator = Operator::from_config(&tc.operator)?;
            let retry = tc.effective_retry(&cfg.default);
            tasks.insert(name.clone(), TaskInfo::new(name.clone(), operator, retry, deps));
        }

        Ok(Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
            interval: None,
        })
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn current_interval(&self) -> Option<DataInterval> {
        self.interval
    }

    /// Read-only view of the given task's run state; `None` for unknown tasks.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether the dependencies of `task` all succeeded in the current run.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let mgr = ReadOnlyStateManager::new(&self.tasks);
        Some(mgr.deps_satisfied_for_info(info))
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    /// Start a new run over `interval` and return the tasks that can start
    /// immediately (the DAG roots).
    ///
    /// Any previous run is abandoned; its state is overwritten.
    pub fn start_new_run(&mut self, interval: DataInterval) -> Vec<ScheduledTask> {
        self.step_start(interval).newly_scheduled
    }

    /// Record a task's outcome; returns tasks that became ready.
    pub fn handle_completion(
        &mut self,
        task: &str,
        run_id: u64,
        outcome: TaskOutcome,
    ) -> Vec<ScheduledTask> {
        self.step_completion(task, run_id, outcome).newly_scheduled
    }

    /// Manual-step variant of [`Scheduler::start_new_run`].
    pub fn step_start(&mut self, interval: DataInterval) -> SchedulerStep {
        if let Some(previous) = self.current_run_id {
            warn!(run_id = previous, "starting a new run while one is active; abandoning it");
        }

        self.run_counter += 1;
        let run_id = self.run_counter;
        self.current_run_id = Some(run_id);
        self.interval = Some(interval);

        info!(run_id, %interval, tasks = self.tasks.len(), "starting DAG run");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks);
        manager.reset_all_pending();
        let newly_scheduled = manager.collect_new_ready_tasks(run_id, interval);
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    /// Manual-step variant of [`Scheduler::handle_completion`].
    pub fn step_completion(
        &mut self,
        task: &str,
        run_id: u64,
        outcome: TaskOutcome,
    ) -> SchedulerStep {
        let (Some(current), Some(interval)) = (self.current_run_id, self.interval) else {
            warn!(task = %task, run_id, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        if run_id != current {
            warn!(task = %task, run_id, current, "completion from a stale run; ignoring");
            return SchedulerStep::default();
        }

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                TaskOutcome::Success => {
                    info.run_state = Some(RunState::DoneSuccess);
                    debug!(task = %info.name, run_id, "task completed successfully");
                    let mut manager = StateManager::new(&self.graph, &mut self.tasks);
                    newly_scheduled.extend(manager.collect_new_ready_tasks(run_id, interval));
                }
                TaskOutcome::Failed(kind) => {
                    info.run_state = Some(RunState::DoneFailed);
                    info.failure = Some(kind);
                    newly_failed.push(info.name.clone());

                    let mut manager = StateManager::new(&self.graph, &mut self.tasks);
                    let mut blocked = manager.mark_dependents_upstream_failed(task);
                    if !blocked.is_empty() {
                        warn!(
                            task = %task,
                            run_id,
                            failure_kind = %kind,
                            blocked = ?blocked,
                            "task failed; dependents will not run"
                        );
                    }
                    newly_failed.append(&mut blocked);
                }
            },
            Some(info) => {
                warn!(task = %task, run_id, state = ?info.run_state, "completion for a task that is not running; ignoring");
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }

    /// Snapshot of every task's state in the latest run.
    pub fn report(&self) -> RunReport {
        let states: BTreeMap<TaskName, TaskRunState> = self
            .tasks
            .iter()
            .map(|(name, info)| (name.clone(), info.run_state.into()))
            .collect();
        let failures = self
            .tasks
            .iter()
            .filter_map(|(name, info)| info.failure.map(|kind| (name.clone(), kind)))
            .collect();

        RunReport {
            run_id: self.run_counter,
            interval: self.interval,
            states,
            failures,
            interrupted: false,
        }
    }

    /// Clear `current_run_id` once every task is terminal. Returns `true` if
    /// this call finished the run.
    fn maybe_finish_run(&mut self) -> bool {
        let Some(run_id) = self.current_run_id else {
            return false;
        };

        let manager = StateManager::new(&self.graph, &mut self.tasks);
        if !manager.all_tasks_terminal() {
            return false;
        }

        let failed = self
            .tasks
            .values()
            .filter(|info| info.run_state != Some(RunState::DoneSuccess))
            .count();
        info!(run_id, failed, "all tasks terminal; DAG run finished");
        self.current_run_id = None;
        true
    }
}
