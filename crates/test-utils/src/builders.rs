#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use loaddag::config::{
    BuiltinWorkflow, ConfigFile, DagSection, DefaultSection, OperatorConfig, RawConfigFile,
    StorageSection, TaskConfig, WarehouseSection,
};
use loaddag::errors::Result;
use loaddag::types::JsonShape;
use loaddag::warehouse::SqlValue;

/// Start of the sample event log (2018-11-01), used as the default
/// `start_date` of test configs.
pub fn sample_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 11, 1, 0, 0, 0).unwrap()
}

/// Builder for `ConfigFile` to simplify test setup.
///
/// Defaults differ from production: `start_date` is set and retries are off.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                workflow: None,
                dag: DagSection {
                    start_date: Some(sample_start()),
                    ..DagSection::default()
                },
                default: DefaultSection {
                    retries: 0,
                    retry_delay: "0ms".to_string(),
                    ..DefaultSection::default()
                },
                warehouse: WarehouseSection::default(),
                storage: StorageSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_song_plays(mut self) -> Self {
        self.config.workflow = Some(BuiltinWorkflow::SongPlays);
        self
    }

    pub fn with_storage_url(mut self, url: &str) -> Self {
        self.config.storage.url = url.to_string();
        self
    }

    pub fn with_schedule(mut self, cron: &str) -> Self {
        self.config.dag.schedule = cron.to_string();
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.config.dag.start_date = Some(start);
        self.config.dag.end_date = end;
        self
    }

    pub fn without_start_date(mut self) -> Self {
        self.config.dag.start_date = None;
        self
    }

    pub fn with_catchup(mut self, val: bool) -> Self {
        self.config.dag.catchup = val;
        self
    }

    pub fn with_max_active_tasks(mut self, n: usize) -> Self {
        self.config.dag.max_active_tasks = n;
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: &str) -> Self {
        self.config.default.retries = retries;
        self.config.default.retry_delay = delay.to_string();
        self
    }

    pub fn with_depends_on_past(mut self, val: bool) -> Self {
        self.config.default.depends_on_past = val;
        self
    }

    pub fn with_pool_size(mut self, n: usize) -> Self {
        self.config.warehouse.pool_size = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(operator: OperatorConfig) -> Self {
        Self {
            task: TaskConfig::new(operator),
        }
    }

    pub fn noop() -> Self {
        Self::new(OperatorConfig::Noop)
    }

    pub fn stage(table: &str, key: &str, json: JsonShape) -> Self {
        Self::new(OperatorConfig::Stage {
            table: table.to_string(),
            key: key.to_string(),
            json,
        })
    }

    pub fn load_fact(table: &str, select: &str) -> Self {
        Self::new(OperatorConfig::LoadFact {
            table: table.to_string(),
            select: Some(select.to_string()),
            query: None,
        })
    }

    pub fn load_dimension(table: &str, select: &str, replace: bool) -> Self {
        Self::new(OperatorConfig::LoadDimension {
            table: table.to_string(),
            select: Some(select.to_string()),
            query: None,
            replace,
        })
    }

    pub fn quality_check(sql: &str, expected: impl Into<SqlValue>) -> Self {
        Self::new(OperatorConfig::QualityCheck {
            sql: sql.to_string(),
            expected: expected.into(),
        })
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn retry_delay(mut self, delay: &str) -> Self {
        self.task.retry_delay = Some(delay.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
