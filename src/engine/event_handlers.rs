// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::info;

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::{TaskName, TaskOutcome};
use crate::schedule::DataInterval;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run is over (finished or abandoned); stop waiting for events.
    FinishRun,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep waiting for events of this run.
    pub keep_running: bool,
}

impl CoreStep {
    fn from_dispatch(newly_ready: Vec<ScheduledTask>, run_just_finished: bool) -> Self {
        let mut commands = Vec::new();
        if !newly_ready.is_empty() {
            commands.push(CoreCommand::DispatchTasks(newly_ready));
        }
        if run_just_finished {
            commands.push(CoreCommand::FinishRun);
        }
        CoreStep {
            commands,
            keep_running: !run_just_finished,
        }
    }
}

/// Start a run over `interval`, dispatching the DAG roots.
pub fn handle_run_start(scheduler: &mut Scheduler, interval: DataInterval) -> CoreStep {
    let step = scheduler.step_start(interval);
    CoreStep::from_dispatch(step.newly_scheduled, step.run_just_finished)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskName,
    run_id: u64,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.step_completion(&task, run_id, outcome);
    CoreStep::from_dispatch(step.newly_scheduled, step.run_just_finished)
}

/// Stop dispatching. Tasks already handed to the executor are left to the
/// executor's shutdown.
pub fn handle_shutdown(scheduler: &Scheduler) -> CoreStep {
    info!(run_id = scheduler.current_run_id(), "shutdown requested; no further tasks will be dispatched");
    CoreStep {
        commands: vec![CoreCommand::FinishRun],
        keep_running: false,
    }
}
