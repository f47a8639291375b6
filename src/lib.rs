// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod operators;
pub mod schedule;
pub mod sql;
pub mod storage;
pub mod types;
pub mod warehouse;
pub mod workflows;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunReport, Runtime, RuntimeEvent};
use crate::exec::RealExecutorBackend;
use crate::operators::{Operator, TaskEnv};
use crate::schedule::DataInterval;
use crate::storage::ObjectSource;
use crate::warehouse::WarehousePool;

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, the warehouse pool and object source, the
/// scheduler/runtime, the executor and Ctrl-C handling. Returns an error if
/// any DAG run failed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config '{}'", config_path.display()))?;
    cfg.warehouse.path = resolve_against(&config_root_dir(&config_path), &cfg.warehouse.path);

    let now = Utc::now();

    match args.command {
        Command::Plan => {
            print_plan(&cfg, now)?;
            Ok(())
        }
        Command::InitSchema => {
            let pool = open_warehouse(&cfg)?;
            init_schema(&pool).await?;
            info!(path = %pool.path().display(), "warehouse schema created");
            Ok(())
        }
        Command::Run { logical_date } => {
            let intervals = intervals_for_run(&cfg, logical_date, now)?;
            let env = Arc::new(open_env(&cfg)?);
            let reports = execute_runs(&cfg, intervals, env).await?;
            finish(&reports)
        }
        Command::Backfill { from, to } => {
            let schedule = cfg.schedule();
            let from = from.unwrap_or(schedule.start_date());
            let to = to.unwrap_or(now);
            let intervals: Vec<_> = schedule
                .intervals_between(from, to)
                .into_iter()
                .filter(|i| i.end <= now)
                .collect();
            if intervals.is_empty() {
                bail!(
                    "no complete intervals between {} and {}",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                );
            }
            info!(count = intervals.len(), "backfilling intervals");

            let env = Arc::new(open_env(&cfg)?);
            let reports = execute_runs(&cfg, intervals, env).await?;
            finish(&reports)
        }
    }
}

/// Resolve a relative warehouse path against the directory of the config
/// file.
fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Directory of the config file, or `.` for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Intervals for `run`: the given logical date, else the latest complete
/// interval, or every complete interval when `catchup` is set.
pub fn intervals_for_run(
    cfg: &ConfigFile,
    logical_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Vec<DataInterval>> {
    let schedule = cfg.schedule();

    if let Some(date) = logical_date {
        return Ok(vec![schedule.interval_at(date)?]);
    }

    if cfg.dag.catchup {
        let intervals: Vec<_> = schedule
            .all_intervals(now)
            .into_iter()
            .filter(|i| i.end <= now)
            .collect();
        if intervals.is_empty() {
            bail!("no complete interval yet (start_date {})", schedule.start_date().to_rfc3339());
        }
        return Ok(intervals);
    }

    match schedule.latest_complete(now) {
        Some(interval) => Ok(vec![interval]),
        None => bail!(
            "no complete interval yet (start_date {})",
            schedule.start_date().to_rfc3339()
        ),
    }
}

pub fn open_warehouse(cfg: &ConfigFile) -> Result<WarehousePool> {
    let pool = WarehousePool::open(
        &cfg.warehouse.path,
        cfg.warehouse.pool_size,
        cfg.warehouse.busy_timeout(),
    )?;
    debug!(path = %pool.path().display(), size = cfg.warehouse.pool_size, "warehouse pool opened");
    Ok(pool)
}

/// Open the warehouse pool and object source described by the config.
pub fn open_env(cfg: &ConfigFile) -> Result<TaskEnv> {
    Ok(TaskEnv {
        warehouse: open_warehouse(cfg)?,
        storage: ObjectSource::from_config(&cfg.storage)?,
    })
}

/// Create every table used by the song plays workflow (idempotent).
pub async fn init_schema(pool: &WarehousePool) -> Result<()> {
    pool.with_connection(|wh| wh.execute_batch(sql::CREATE_TABLES))
        .await
        .context("creating warehouse tables")?;
    Ok(())
}

/// Run the DAG once over `interval`.
pub async fn execute_run(
    cfg: &ConfigFile,
    interval: DataInterval,
    env: Arc<TaskEnv>,
) -> Result<RunReport> {
    let mut reports = execute_runs(cfg, vec![interval], env).await?;
    reports
        .pop()
        .context("runtime produced no report for the requested interval")
}

/// Run the DAG over each interval in order, one run at a time.
///
/// Stops early on Ctrl-C, or after a failed run when
/// `[default].depends_on_past` is set.
pub async fn execute_runs(
    cfg: &ConfigFile,
    intervals: Vec<DataInterval>,
    env: Arc<TaskEnv>,
) -> Result<Vec<RunReport>> {
    let scheduler = Scheduler::from_config(cfg)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(env, rt_tx.clone(), cfg.dag.max_active_tasks);

    // Ctrl-C → graceful shutdown.
    let ctrl_c = {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    };

    let mut runtime = Runtime::new(CoreRuntime::new(scheduler), rt_rx, executor);
    let mut reports = Vec::with_capacity(intervals.len());

    for interval in intervals {
        let report = runtime.run_interval(interval).await?;
        let failed = !report.succeeded();
        reports.push(report);

        if runtime.shutdown_requested() {
            warn!("shutdown requested; not starting further runs");
            break;
        }
        if failed && cfg.default.depends_on_past {
            warn!(%interval, "run failed and depends_on_past is set; stopping");
            break;
        }
    }

    ctrl_c.abort();
    Ok(reports)
}

fn finish(reports: &[RunReport]) -> Result<()> {
    for report in reports {
        println!("{report}");
    }

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        bail!("{failed} of {} DAG run(s) did not succeed", reports.len());
    }
    Ok(())
}

/// Print tasks, dependencies, topological order, schedule and intervals.
/// Executes nothing.
pub fn print_plan(cfg: &ConfigFile, now: DateTime<Utc>) -> Result<()> {
    let scheduler = Scheduler::from_config(cfg)?;
    let graph = scheduler.graph();
    let order = graph.topological_order()?;
    let schedule = cfg.schedule();

    println!("loaddag plan: {}", cfg.dag.id);
    if let Some(desc) = &cfg.dag.description {
        println!("  {desc}");
    }
    println!("  owner = {}", cfg.default.owner);
    println!("  warehouse = {}", cfg.warehouse.path.display());
    println!("  storage = {}", cfg.storage.url);
    println!("  max_active_tasks = {}", cfg.dag.max_active_tasks);
    println!();

    println!("tasks ({}, topological order):", order.len());
    for name in &order {
        let Some(tc) = cfg.task.get(name) else {
            continue;
        };
        let operator = Operator::from_config(&tc.operator)?;
        let retry = tc.effective_retry(&cfg.default);

        println!("  - {name}");
        println!("      {}", operator.describe());
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if retry.retries > 0 {
            println!("      retries: {} every {:?}", retry.retries, retry.delay);
        }
    }
    println!();

    println!("schedule: {}", schedule.expression());
    println!("  start_date = {}", schedule.start_date().to_rfc3339());
    if let Some(end) = schedule.end_date() {
        println!("  end_date = {}", end.to_rfc3339());
    }
    println!("  catchup = {}", cfg.dag.catchup);

    let intervals = schedule.all_intervals(now);
    println!("  runnable intervals: {}", intervals.len());
    const SHOWN: usize = 5;
    for interval in intervals.iter().take(SHOWN) {
        println!("    {interval}");
    }
    if intervals.len() > SHOWN * 2 {
        println!("    ...");
    }
    for interval in intervals.iter().skip(SHOWN.max(intervals.len().saturating_sub(SHOWN))) {
        println!("    {interval}");
    }
    match schedule.latest_complete(now) {
        Some(latest) => println!("  latest complete: {latest}"),
        None => println!("  latest complete: none yet"),
    }

    debug!("plan complete (no execution)");
    Ok(())
}
