// tests/executor_loop.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use loaddag::config::RetryPolicy;
use loaddag::dag::ScheduledTask;
use loaddag::engine::{RuntimeEvent, TaskOutcome};
use loaddag::exec::spawn_executor_with;
use loaddag::operators::Operator;
use loaddag::schedule::DataInterval;
use loaddag::types::FailureKind;
use loaddag_test_utils::builders::sample_start;
use loaddag_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

fn task(name: &str) -> ScheduledTask {
    ScheduledTask {
        name: name.to_string(),
        operator: Arc::new(Operator::Noop),
        retry: RetryPolicy::none(),
        run_id: 7,
        interval: DataInterval::new(sample_start(), sample_start() + Duration::hours(1)),
    }
}

#[tokio::test]
async fn panicking_runner_is_reported_as_failed() {
    init_tracing();
    let (runtime_tx, mut runtime_rx) = mpsc::channel(16);
    let report_tx = runtime_tx.clone();

    let executor = spawn_executor_with(runtime_tx, 2, move |task: ScheduledTask| {
        let report_tx = report_tx.clone();
        async move {
            if task.name == "explodes" {
                panic!("operator bug");
            }
            let _ = report_tx
                .send(RuntimeEvent::TaskCompleted {
                    task: task.name,
                    run_id: task.run_id,
                    outcome: TaskOutcome::Success,
                })
                .await;
        }
    });

    executor.send(task("explodes")).await.unwrap();
    executor.send(task("fine")).await.unwrap();

    let mut outcomes = HashMap::new();
    while outcomes.len() < 2 {
        match with_timeout(runtime_rx.recv()).await {
            Some(RuntimeEvent::TaskCompleted { task, run_id, outcome }) => {
                assert_eq!(run_id, 7);
                outcomes.insert(task, outcome);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(
        outcomes.get("explodes"),
        Some(&TaskOutcome::Failed(FailureKind::MalformedInput))
    );
    assert_eq!(outcomes.get("fine"), Some(&TaskOutcome::Success));
}
