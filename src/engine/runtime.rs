// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::schedule::DataInterval;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RunReport, RuntimeEvent};

/// Drives the DAG scheduler in response to `RuntimeEvent`s and delegates
/// task execution to an `ExecutorBackend`.
///
/// All run semantics live in `CoreRuntime`; this struct only moves events
/// and tasks between channels.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    pub fn core(&self) -> &CoreRuntime {
        &self.core
    }

    /// Whether a shutdown was requested during an earlier run.
    pub fn shutdown_requested(&self) -> bool {
        self.core.shutdown_requested()
    }

    /// Execute one DAG run over `interval` and wait until every task is
    /// terminal or a shutdown is requested.
    pub async fn run_interval(&mut self, interval: DataInterval) -> Result<RunReport> {
        let step = self.core.start_run(interval);
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!("runtime event channel closed before the run finished");
                    break;
                }
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        let report = self.core.report();
        if report.interrupted {
            warn!(run_id = report.run_id, unfinished = ?report.unfinished(), "run interrupted");
        } else {
            info!(run_id = report.run_id, success = report.succeeded(), "run complete");
        }
        Ok(report)
    }

    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
                CoreCommand::FinishRun => debug!("core finished the run"),
            }
        }
        Ok(step.keep_running)
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, run_id = tasks[0].run_id, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
