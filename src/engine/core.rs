// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! A synchronous, deterministic core that consumes [`RuntimeEvent`]s and
//! produces:
//! - an updated scheduler state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! sends `ScheduledTask`s to the executor and handles Ctrl+C. The core can be
//! tested without Tokio, channels or a warehouse.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_run_start, handle_shutdown, handle_task_completion, CoreStep,
};
use crate::engine::{RunReport, RuntimeEvent};
use crate::schedule::DataInterval;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    shutdown_requested: bool,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            shutdown_requested: false,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Once set, no further runs should be started.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Begin a DAG run over `interval`.
    pub fn start_run(&mut self, interval: DataInterval) -> CoreStep {
        handle_run_start(&mut self.scheduler, interval)
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted {
                task,
                run_id,
                outcome,
            } => handle_task_completion(&mut self.scheduler, task, run_id, outcome),
            RuntimeEvent::ShutdownRequested => {
                self.shutdown_requested = true;
                handle_shutdown(&self.scheduler)
            }
        }
    }

    /// Report of the latest run, flagged as interrupted if it was stopped
    /// before every task finished.
    pub fn report(&self) -> RunReport {
        let mut report = self.scheduler.report();
        report.interrupted = !self.scheduler.is_idle();
        report
    }
}
