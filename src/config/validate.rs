// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    parse_duration, BuiltinWorkflow, ConfigFile, OperatorConfig, RawConfigFile, TaskConfig,
};
use crate::errors::{LoaddagError, Result};
use crate::schedule::DagSchedule;
use crate::warehouse::validate_identifier;
use crate::workflows;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = LoaddagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tasks = expand_workflow(&raw)?;
        ensure_has_tasks(&tasks)?;
        validate_global_config(&raw)?;
        validate_task_dependencies(&tasks)?;
        validate_operators(&tasks)?;
        validate_dag(&tasks)?;
        let schedule = build_schedule(&raw)?;

        Ok(ConfigFile::new_unchecked(
            raw.dag,
            raw.default,
            raw.warehouse,
            raw.storage,
            tasks,
            schedule,
        ))
    }
}

fn expand_workflow(cfg: &RawConfigFile) -> Result<BTreeMap<String, TaskConfig>> {
    match cfg.workflow {
        None => Ok(cfg.task.clone()),
        Some(_) if !cfg.task.is_empty() => Err(LoaddagError::ConfigError(
            "`workflow` and [task.<name>] sections are mutually exclusive".to_string(),
        )),
        Some(BuiltinWorkflow::SongPlays) => {
            let params = workflows::SongPlaysParams::from_storage(&cfg.storage);
            workflows::song_plays(&params).build()
        }
    }
}

fn ensure_has_tasks(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    if tasks.is_empty() {
        return Err(LoaddagError::ConfigError(
            "config must contain at least one [task.<name>] section or a `workflow`".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.dag.max_active_tasks == 0 {
        return Err(LoaddagError::ConfigError(
            "[dag].max_active_tasks must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.warehouse.pool_size == 0 {
        return Err(LoaddagError::ConfigError(
            "[warehouse].pool_size must be >= 1 (got 0)".to_string(),
        ));
    }

    parse_duration(&cfg.warehouse.busy_timeout)
        .map_err(|e| LoaddagError::ConfigError(format!("[warehouse].busy_timeout: {e}")))?;
    parse_duration(&cfg.default.retry_delay)
        .map_err(|e| LoaddagError::ConfigError(format!("[default].retry_delay: {e}")))?;

    for (name, task) in cfg.task.iter() {
        if let Some(delay) = &task.retry_delay {
            parse_duration(delay).map_err(|e| {
                LoaddagError::ConfigError(format!("task '{name}' retry_delay: {e}"))
            })?;
        }
    }

    Ok(())
}

fn validate_task_dependencies(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            if !tasks.contains_key(dep) {
                return Err(LoaddagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(LoaddagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_operators(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    for (name, task) in tasks.iter() {
        let op = &task.operator;

        if let Some(table) = op.target_table() {
            validate_identifier(table).map_err(|e| {
                LoaddagError::ConfigError(format!("task '{name}' ({}): {e}", op.kind()))
            })?;
        }

        op.resolve_select().map_err(|e| {
            LoaddagError::ConfigError(format!("task '{name}' ({}): {e}", op.kind()))
        })?;

        match op {
            OperatorConfig::Stage { key, .. } if key.trim().is_empty() => {
                return Err(LoaddagError::ConfigError(format!(
                    "task '{name}' (stage): `key` must not be empty"
                )));
            }
            OperatorConfig::QualityCheck { sql, .. } if sql.trim().is_empty() => {
                return Err(LoaddagError::ConfigError(format!(
                    "task '{name}' (quality_check): `sql` must not be empty"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_dag(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(LoaddagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

fn build_schedule(cfg: &RawConfigFile) -> Result<DagSchedule> {
    let start = cfg.dag.start_date.ok_or_else(|| {
        LoaddagError::ConfigError("[dag].start_date is required".to_string())
    })?;
    DagSchedule::new(&cfg.dag.schedule, start, cfg.dag.end_date)
}
