// src/exec/executor_loop.rs

//! Executor loop: one Tokio task per scheduled task, bounded by a semaphore.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName, TaskOutcome};
use crate::exec::task_runner::run_task;
use crate::operators::TaskEnv;
use crate::types::FailureKind;

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` forwards scheduled tasks
/// to. At most `max_active_tasks` operators execute at the same time; the
/// rest wait for a permit. When the sender is dropped, tasks still in flight
/// are aborted.
pub fn spawn_executor(
    env: Arc<TaskEnv>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    max_active_tasks: usize,
) -> mpsc::Sender<ScheduledTask> {
    let tx = runtime_tx.clone();
    spawn_executor_with(runtime_tx, max_active_tasks, move |task| {
        run_task(task, Arc::clone(&env), tx.clone())
    })
}

/// Executor loop around an arbitrary task runner.
///
/// `runner` is expected to report `TaskCompleted` itself. If it panics, the
/// loop reports the task as failed so the run can still finish.
pub fn spawn_executor_with<R, Fut>(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    max_active_tasks: usize,
    runner: R,
) -> mpsc::Sender<ScheduledTask>
where
    R: Fn(ScheduledTask) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);
    let permits = Arc::new(Semaphore::new(max_active_tasks.max(1)));

    tokio::spawn(async move {
        info!(max_active_tasks, "executor loop started");
        let mut running: JoinSet<()> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (TaskName, u64)> = HashMap::new();

        loop {
            tokio::select! {
                maybe_task = rx.recv() => {
                    let Some(task) = maybe_task else { break };
                    let label = (task.name.clone(), task.run_id);
                    let permits = Arc::clone(&permits);
                    let work = runner(task);

                    let handle = running.spawn(async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            warn!("executor semaphore closed; dropping task");
                            return;
                        };
                        work.await;
                    });
                    trace!(task = %label.0, run_id = label.1, "task queued for an execution slot");
                    in_flight.insert(handle.id(), label);
                }
                Some(joined) = running.join_next_with_id(), if !running.is_empty() => {
                    match joined {
                        Ok((id, ())) => {
                            in_flight.remove(&id);
                        }
                        Err(e) => {
                            let Some((task, run_id)) = in_flight.remove(&e.id()) else {
                                warn!(error = %e, "unknown task runner ended abnormally");
                                continue;
                            };
                            error!(task = %task, run_id, error = %e, "task runner ended abnormally");
                            let failed = RuntimeEvent::TaskCompleted {
                                task,
                                run_id,
                                outcome: TaskOutcome::Failed(FailureKind::MalformedInput),
                            };
                            if runtime_tx.send(failed).await.is_err() {
                                debug!("runtime gone; dropping failure of aborted task");
                            }
                        }
                    }
                }
            }
        }

        if !running.is_empty() {
            debug!(in_flight = running.len(), "aborting in-flight tasks");
            running.shutdown().await;
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}
