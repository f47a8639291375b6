// tests/runtime_fake_executor.rs

use std::sync::{Arc, Mutex};

use chrono::Duration;
use loaddag::config::ConfigFile;
use loaddag::dag::{Scheduler, TaskRunState};
use loaddag::engine::{CoreCommand, CoreRuntime, RunReport, Runtime, RuntimeEvent, TaskOutcome};
use loaddag::schedule::DataInterval;
use loaddag::types::FailureKind;
use loaddag::workflows::{
    BEGIN, END, LOAD_ARTISTS, LOAD_SONGPLAYS, LOAD_SONGS, LOAD_TIME, LOAD_USERS, QUALITY_CHECKS,
    STAGE_EVENTS, STAGE_SONGS,
};
use loaddag_test_utils::builders::{sample_start, ConfigFileBuilder};
use loaddag_test_utils::fake_executor::FakeExecutor;
use loaddag_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

const DIMENSIONS: [&str; 4] = [LOAD_USERS, LOAD_SONGS, LOAD_ARTISTS, LOAD_TIME];

fn song_plays_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_song_plays()
        .with_storage_url("memory://")
        .build()
}

fn first_interval() -> DataInterval {
    let start = sample_start();
    DataInterval::new(start, start + Duration::hours(1))
}

fn position(order: &[String], task: &str) -> usize {
    order
        .iter()
        .position(|t| t == task)
        .unwrap_or_else(|| panic!("{task} was never dispatched: {order:?}"))
}

type Harness = (Runtime<FakeExecutor>, Arc<Mutex<Vec<String>>>);

fn harness(cfg: &ConfigFile, failing: &[(&str, FailureKind)]) -> Harness {
    let scheduler = Scheduler::from_config(cfg).unwrap();
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));

    let mut executor = FakeExecutor::new(tx, Arc::clone(&executed));
    for (task, kind) in failing {
        executor = executor.failing(task, *kind);
    }

    (Runtime::new(CoreRuntime::new(scheduler), rx, executor), executed)
}

async fn run_once(cfg: &ConfigFile, failing: &[(&str, FailureKind)]) -> (RunReport, Vec<String>) {
    let (mut runtime, executed) = harness(cfg, failing);
    let report = with_timeout(runtime.run_interval(first_interval()))
        .await
        .unwrap();
    let order = executed.lock().unwrap().clone();
    (report, order)
}

#[tokio::test]
async fn song_plays_runs_in_dependency_order() {
    init_tracing();
    let cfg = song_plays_config();

    let (report, order) = run_once(&cfg, &[]).await;

    assert!(report.succeeded(), "{report}");
    assert_eq!(report.run_id, 1);
    assert_eq!(report.interval, Some(first_interval()));
    assert_eq!(order.len(), 10);
    assert_eq!(order.first().map(String::as_str), Some(BEGIN));
    assert_eq!(order.last().map(String::as_str), Some(END));

    let fact = position(&order, LOAD_SONGPLAYS);
    assert!(position(&order, STAGE_EVENTS) < fact);
    assert!(position(&order, STAGE_SONGS) < fact);

    let quality = position(&order, QUALITY_CHECKS);
    for dim in DIMENSIONS {
        let at = position(&order, dim);
        assert!(fact < at, "{dim} ran before the fact load");
        assert!(at < quality, "{dim} ran after the quality check");
    }
}

#[tokio::test]
async fn staging_failure_blocks_everything_downstream() {
    init_tracing();
    let cfg = song_plays_config();

    let (report, order) = run_once(&cfg, &[(STAGE_EVENTS, FailureKind::MalformedInput)]).await;

    assert!(!report.succeeded());
    assert!(!report.interrupted);
    assert_eq!(report.state_of(BEGIN), Some(TaskRunState::DoneSuccess));
    assert_eq!(report.state_of(STAGE_SONGS), Some(TaskRunState::DoneSuccess));
    assert_eq!(report.state_of(STAGE_EVENTS), Some(TaskRunState::DoneFailed));
    assert_eq!(report.tasks_in(TaskRunState::UpstreamFailed).len(), 7);
    assert_eq!(
        report.failures.get(STAGE_EVENTS),
        Some(&FailureKind::MalformedInput)
    );
    assert_eq!(report.failures.len(), 1, "blocked tasks are not failures themselves");

    assert!(!order.iter().any(|t| t == LOAD_SONGPLAYS));
    assert!(report.unfinished().is_empty());
}

#[tokio::test]
async fn failed_quality_gate_is_reported_as_data_quality() {
    init_tracing();
    let cfg = song_plays_config();

    let (report, _) = run_once(&cfg, &[(QUALITY_CHECKS, FailureKind::DataQuality)]).await;

    assert!(!report.succeeded());
    assert_eq!(report.state_of(END), Some(TaskRunState::UpstreamFailed));
    for dim in DIMENSIONS {
        assert_eq!(report.state_of(dim), Some(TaskRunState::DoneSuccess));
    }

    let text = report.to_string();
    assert!(text.starts_with("run 1 failed"), "{text}");
    assert!(text.contains("run_data_quality_checks: failed (data_quality)"), "{text}");
}

#[tokio::test]
async fn consecutive_runs_get_new_ids() {
    init_tracing();
    let cfg = song_plays_config();
    let (mut runtime, executed) = harness(&cfg, &[]);

    let first = with_timeout(runtime.run_interval(first_interval()))
        .await
        .unwrap();
    let next = first_interval().end;
    let second = with_timeout(runtime.run_interval(DataInterval::new(next, next + Duration::hours(1))))
        .await
        .unwrap();

    assert_eq!((first.run_id, second.run_id), (1, 2));
    assert!(second.succeeded());
    assert_eq!(second.interval.map(|i| i.start), Some(next));
    assert_eq!(executed.lock().unwrap().len(), 20);
}

fn dispatched(commands: &[CoreCommand]) -> Vec<String> {
    commands
        .iter()
        .flat_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => tasks.iter().map(|t| t.name.clone()).collect(),
            CoreCommand::FinishRun => Vec::new(),
        })
        .collect()
}

fn completed(task: &str, run_id: u64) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        task: task.to_string(),
        run_id,
        outcome: TaskOutcome::Success,
    }
}

#[test]
fn core_runtime_steps_without_io() {
    let cfg = song_plays_config();
    let mut core = CoreRuntime::new(Scheduler::from_config(&cfg).unwrap());

    let step = core.start_run(first_interval());
    assert!(step.keep_running);
    assert_eq!(dispatched(&step.commands), vec![BEGIN]);

    let step = core.step(completed(BEGIN, 1));
    let mut stages = dispatched(&step.commands);
    stages.sort();
    assert_eq!(stages, vec![STAGE_EVENTS, STAGE_SONGS]);

    // The fact load waits for both staging tasks.
    let step = core.step(completed(STAGE_SONGS, 1));
    assert!(dispatched(&step.commands).is_empty());
    let step = core.step(completed(STAGE_EVENTS, 1));
    assert_eq!(dispatched(&step.commands), vec![LOAD_SONGPLAYS]);
}

#[test]
fn stale_and_duplicate_completions_are_ignored() {
    let cfg = song_plays_config();
    let mut core = CoreRuntime::new(Scheduler::from_config(&cfg).unwrap());
    core.start_run(first_interval());

    let step = core.step(completed(BEGIN, 99));
    assert!(step.keep_running);
    assert!(step.commands.is_empty());
    assert_eq!(
        core.scheduler().run_state_of(BEGIN),
        Some(TaskRunState::Running)
    );

    core.step(completed(BEGIN, 1));
    let step = core.step(completed(BEGIN, 1));
    assert!(step.commands.is_empty(), "second completion changes nothing");

    // A task that was never dispatched cannot complete.
    let step = core.step(completed(END, 1));
    assert!(step.commands.is_empty());
    assert_eq!(core.scheduler().run_state_of(END), Some(TaskRunState::Pending));
}

#[test]
fn shutdown_marks_the_run_interrupted() {
    let cfg = song_plays_config();
    let mut core = CoreRuntime::new(Scheduler::from_config(&cfg).unwrap());
    core.start_run(first_interval());
    core.step(completed(BEGIN, 1));

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert!(core.shutdown_requested());

    let report = core.report();
    assert!(report.interrupted);
    assert!(!report.succeeded());
    let mut unfinished = report.unfinished();
    unfinished.sort();
    assert!(unfinished.contains(&STAGE_EVENTS));
    assert!(unfinished.contains(&END));
    assert!(report.to_string().starts_with("run 1 interrupted"));
}
