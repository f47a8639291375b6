// src/exec/task_runner.rs

//! Runs one scheduled task to its final outcome.
//!
//! Operators never retry; this is the single place where the retry policy is
//! applied. Only connectivity failures are retried; malformed input and data
//! quality failures are final on the first attempt.

use std::error::Error as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::TaskError;
use crate::operators::{TaskContext, TaskEnv};
use crate::types::FailureKind;

/// Execute `task` (with retries) and send its `TaskCompleted` event.
pub async fn run_task(
    task: ScheduledTask,
    env: Arc<TaskEnv>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let operator = Arc::clone(&task.operator);
    let outcome = run_with_retries(&task, |try_number| {
        let ctx = TaskContext {
            task: task.name.clone(),
            run_id: task.run_id,
            try_number,
            interval: task.interval,
            env: Arc::clone(&env),
        };
        let operator = Arc::clone(&operator);
        async move { operator.execute(&ctx).await }
    })
    .await;

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            run_id: task.run_id,
            outcome,
        })
        .await
        .is_err()
    {
        warn!(task = %task.name, run_id = task.run_id, "runtime gone; dropping task outcome");
    }
}

/// Call `attempt` until it succeeds, fails with a non-retryable error, or the
/// task's retries are used up. `attempt` receives the 1-based try number.
pub async fn run_with_retries<F, Fut>(task: &ScheduledTask, mut attempt: F) -> TaskOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), TaskError>>,
{
    let policy = &task.retry;
    let max_tries = policy.retries.saturating_add(1);
    let mut try_number = 1;

    loop {
        info!(
            task = %task.name,
            run_id = task.run_id,
            try_number,
            max_tries,
            operator = task.operator.kind(),
            interval = %task.interval,
            "starting task"
        );

        let err = match attempt(try_number).await {
            Ok(()) => {
                info!(task = %task.name, run_id = task.run_id, try_number, "task succeeded");
                return TaskOutcome::Success;
            }
            Err(err) => err,
        };

        let kind = err.kind();
        if err.is_retryable() && try_number < max_tries {
            warn!(
                task = %task.name,
                run_id = task.run_id,
                try_number,
                failure_kind = %kind,
                error = %err,
                retry_in = ?policy.delay,
                "task failed; will retry"
            );
            if policy.email_on_retry {
                info!(task = %task.name, run_id = task.run_id, "retry notification requested (email_on_retry)");
            }
            sleep_before_retry(policy.delay).await;
            try_number += 1;
            continue;
        }

        log_final_failure(task, try_number, kind, &err);
        return TaskOutcome::Failed(kind);
    }
}

async fn sleep_before_retry(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn log_final_failure(task: &ScheduledTask, try_number: u32, kind: FailureKind, err: &TaskError) {
    let detail = error_chain(err);
    match kind {
        FailureKind::DataQuality => error!(
            task = %task.name,
            run_id = task.run_id,
            failure_kind = %kind,
            error = %detail,
            "data quality check failed: data is wrong"
        ),
        _ => error!(
            task = %task.name,
            run_id = task.run_id,
            try_number,
            failure_kind = %kind,
            error = %detail,
            "task failed: pipeline broke"
        ),
    }
}

/// `err: cause: cause` in one line.
fn error_chain(err: &TaskError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
