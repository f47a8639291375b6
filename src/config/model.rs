// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::schedule::DagSchedule;
use crate::sql;
use crate::types::JsonShape;
use crate::warehouse::SqlValue;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// workflow = "song_plays"          # or declare [task.<name>] sections
///
/// [dag]
/// id = "song_plays_dag"
/// schedule = "0 * * * *"
/// start_date = "2019-01-12T00:00:00Z"
/// end_date = "2019-01-12T03:00:00Z"
///
/// [default]
/// owner = "udacity"
/// retries = 3
/// retry_delay = "5m"
///
/// [warehouse]
/// path = "warehouse.db"
///
/// [storage]
/// url = "s3://udacity-dend"
/// region = "us-west-2"
///
/// [task.load_user_dim_table]
/// operator = "load_dimension"
/// table = "users"
/// query = "user_table_insert"
/// after = ["load_songplays_fact_table"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Name of a built-in workflow whose tasks replace `[task.*]`.
    #[serde(default)]
    pub workflow: Option<BuiltinWorkflow>,

    #[serde(default)]
    pub dag: DagSection,

    /// Task defaults from `[default]` (owner, retry policy).
    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(default)]
    pub storage: StorageSection,

    /// All tasks from `[task.<name>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Construct through `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub dag: DagSection,
    pub default: DefaultSection,
    pub warehouse: WarehouseSection,
    pub storage: StorageSection,
    /// Final task set (built-in workflow already expanded).
    pub task: BTreeMap<String, TaskConfig>,
    schedule: DagSchedule,
}

impl ConfigFile {
    /// Assemble a config whose parts were already validated.
    pub(crate) fn new_unchecked(
        dag: DagSection,
        default: DefaultSection,
        warehouse: WarehouseSection,
        storage: StorageSection,
        task: BTreeMap<String, TaskConfig>,
        schedule: DagSchedule,
    ) -> Self {
        Self {
            dag,
            default,
            warehouse,
            storage,
            task,
            schedule,
        }
    }

    pub fn schedule(&self) -> &DagSchedule {
        &self.schedule
    }

    /// Effective retry policy of a task, with `[default]` filling the gaps.
    pub fn retry_policy_of(&self, task: &str) -> Option<RetryPolicy> {
        let tc = self.task.get(task)?;
        Some(tc.effective_retry(&self.default))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinWorkflow {
    /// Stage events and songs, load `songplays` and four dimensions, check.
    SongPlays,
}

/// `[dag]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DagSection {
    #[serde(default = "default_dag_id")]
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Cron expression; 5 fields (minute first) or 6 (second first).
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// RFC 3339 timestamp of the first logical date. Required.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// RFC 3339 timestamp of the last logical date (inclusive).
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// When false, `run` without an explicit logical date only runs the
    /// latest complete interval.
    #[serde(default)]
    pub catchup: bool,

    /// Upper bound on sibling tasks executing at the same time.
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: usize,
}

fn default_dag_id() -> String {
    "loaddag".to_string()
}

fn default_schedule() -> String {
    "0 * * * *".to_string()
}

fn default_max_active_tasks() -> usize {
    16
}

impl Default for DagSection {
    fn default() -> Self {
        Self {
            id: default_dag_id(),
            description: None,
            schedule: default_schedule(),
            start_date: None,
            end_date: None,
            catchup: false,
            max_active_tasks: default_max_active_tasks(),
        }
    }
}

/// `[default]` section: arguments applied to every task.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSection {
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Extra attempts after a retryable failure.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Duration string (`"5m"`, `"30s"`) between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    /// Logged on every retry; no mail is sent.
    #[serde(default)]
    pub email_on_retry: bool,

    /// When true, `backfill` stops at the first failed run.
    #[serde(default)]
    pub depends_on_past: bool,
}

fn default_owner() -> String {
    "loaddag".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "5m".to_string()
}

impl Default for DefaultSection {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            email_on_retry: false,
            depends_on_past: false,
        }
    }
}

/// `[warehouse]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseSection {
    /// SQLite database file.
    #[serde(default = "default_warehouse_path")]
    pub path: PathBuf,

    /// Maximum connections checked out at once.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a statement waits on a locked database.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: String,
}

fn default_warehouse_path() -> PathBuf {
    PathBuf::from("warehouse.db")
}

fn default_pool_size() -> usize {
    4
}

fn default_busy_timeout() -> String {
    "30s".to_string()
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            path: default_warehouse_path(),
            pool_size: default_pool_size(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl WarehouseSection {
    pub fn busy_timeout(&self) -> Duration {
        parse_duration(&self.busy_timeout).unwrap_or(Duration::from_secs(30))
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// `s3://bucket[/prefix]`, `file:///dir` or `memory://`.
    #[serde(default = "default_storage_url")]
    pub url: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_storage_url() -> String {
    "memory://".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            url: default_storage_url(),
            region: None,
            endpoint: None,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Tasks that must succeed before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Overrides `default.retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Overrides `default.retry_delay`.
    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(flatten)]
    pub operator: OperatorConfig,
}

impl TaskConfig {
    pub fn new(operator: OperatorConfig) -> Self {
        Self {
            after: Vec::new(),
            retries: None,
            retry_delay: None,
            operator,
        }
    }

    pub fn effective_retry(&self, defaults: &DefaultSection) -> RetryPolicy {
        let delay = self
            .retry_delay
            .as_deref()
            .unwrap_or(&defaults.retry_delay);
        RetryPolicy {
            retries: self.retries.unwrap_or(defaults.retries),
            delay: parse_duration(delay).unwrap_or(Duration::from_secs(300)),
            email_on_retry: defaults.email_on_retry,
        }
    }
}

/// Operator selected by the `operator = "..."` tag of a task.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum OperatorConfig {
    /// Marker task (begin/end of the graph); does nothing.
    Noop,

    /// Copy newline-delimited JSON objects under `key` into `table`.
    Stage {
        table: String,
        key: String,
        #[serde(default)]
        json: JsonShape,
    },

    /// Append the result of a SELECT to a fact table.
    LoadFact {
        table: String,
        #[serde(default)]
        select: Option<String>,
        #[serde(default)]
        query: Option<String>,
    },

    /// Load a dimension table, truncating it first when `replace` is true.
    LoadDimension {
        table: String,
        #[serde(default)]
        select: Option<String>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default = "default_replace")]
        replace: bool,
    },

    /// Compare the scalar result of `sql` with `expected`.
    QualityCheck { sql: String, expected: SqlValue },
}

fn default_replace() -> bool {
    true
}

impl OperatorConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            OperatorConfig::Noop => "noop",
            OperatorConfig::Stage { .. } => "stage",
            OperatorConfig::LoadFact { .. } => "load_fact",
            OperatorConfig::LoadDimension { .. } => "load_dimension",
            OperatorConfig::QualityCheck { .. } => "quality_check",
        }
    }

    pub fn target_table(&self) -> Option<&str> {
        match self {
            OperatorConfig::Stage { table, .. }
            | OperatorConfig::LoadFact { table, .. }
            | OperatorConfig::LoadDimension { table, .. } => Some(table),
            OperatorConfig::Noop | OperatorConfig::QualityCheck { .. } => None,
        }
    }

    /// The SELECT of a table loader: inline `select` or built-in `query`.
    pub fn resolve_select(&self) -> Result<Option<String>, String> {
        let (select, query) = match self {
            OperatorConfig::LoadFact { select, query, .. }
            | OperatorConfig::LoadDimension { select, query, .. } => (select, query),
            _ => return Ok(None),
        };

        match (select, query) {
            (Some(_), Some(_)) => Err("set either `select` or `query`, not both".to_string()),
            (None, None) => Err("one of `select` or `query` is required".to_string()),
            (Some(sql), None) if sql.trim().is_empty() => Err("`select` is empty".to_string()),
            (Some(sql), None) => Ok(Some(sql.clone())),
            (None, Some(name)) => sql::query_by_name(name)
                .map(|sql| Some(sql.to_string()))
                .ok_or_else(|| {
                    format!(
                        "unknown built-in query '{name}' (known: {})",
                        sql::QUERY_NAMES.join(", ")
                    )
                }),
        }
    }
}

/// Retry behaviour applied by the task runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub email_on_retry: bool,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
            email_on_retry: false,
        }
    }
}

/// Parse `"500ms"`, `"30s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
