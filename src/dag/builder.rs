// src/dag/builder.rs

//! Programmatic graph definition with fan-out / fan-in edge sets.
//!
//! ```ignore
//! DagBuilder::new()
//!     .task("start", OperatorConfig::Noop)
//!     .task("a", op_a)
//!     .task("b", op_b)
//!     .task("join", op_join)
//!     .fan(&["start"], &["a", "b"])   // fan-out
//!     .fan(&["a", "b"], &["join"])    // fan-in
//!     .build()?;
//! ```

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::model::{OperatorConfig, TaskConfig};
use crate::dag::DagGraph;
use crate::errors::{LoaddagError, Result};

#[derive(Debug, Default, Clone)]
pub struct DagBuilder {
    tasks: Vec<(String, TaskConfig)>,
    unknown: Vec<String>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task. Re-declaring a name replaces its operator.
    pub fn task(self, name: &str, operator: OperatorConfig) -> Self {
        self.task_config(name, TaskConfig::new(operator))
    }

    /// Declare a task with a full config (retry overrides etc.).
    pub fn task_config(mut self, name: &str, config: TaskConfig) -> Self {
        match self.tasks.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => {
                let after = std::mem::take(&mut existing.after);
                *existing = config;
                existing.after.extend(after);
            }
            None => self.tasks.push((name.to_string(), config)),
        }
        self
    }

    /// Make every task in `downstream` wait for every task in `upstream`.
    ///
    /// An edge that already exists is reported and skipped, so a name listed
    /// twice in one edge set contributes a single dependency.
    pub fn fan(mut self, upstream: &[&str], downstream: &[&str]) -> Self {
        for down in downstream {
            let Some((_, task)) = self.tasks.iter_mut().find(|(n, _)| n == down) else {
                self.unknown.push((*down).to_string());
                continue;
            };

            for up in upstream {
                if task.after.iter().any(|a| a == up) {
                    warn!(
                        upstream = %up,
                        downstream = %down,
                        "duplicate edge in task graph; keeping a single dependency"
                    );
                    continue;
                }
                task.after.push((*up).to_string());
            }
        }
        self
    }

    /// Chain edge sets: `chain(&[&a, &b, &c])` is `fan(a, b).fan(b, c)`.
    pub fn chain(mut self, stages: &[&[&str]]) -> Self {
        for pair in stages.windows(2) {
            self = self.fan(pair[0], pair[1]);
        }
        self
    }

    /// Validate the edges and return the task map.
    pub fn build(self) -> Result<BTreeMap<String, TaskConfig>> {
        if let Some(name) = self.unknown.first() {
            return Err(LoaddagError::TaskNotFound(format!(
                "'{name}' used in an edge but never declared"
            )));
        }

        DagGraph::from_pairs(
            self.tasks
                .iter()
                .map(|(name, task)| (name.clone(), task.after.clone())),
        )?;

        Ok(self.tasks.into_iter().collect())
    }

    /// Validate and return the graph in declaration order.
    pub fn build_graph(self) -> Result<DagGraph> {
        if let Some(name) = self.unknown.first() {
            return Err(LoaddagError::TaskNotFound(format!(
                "'{name}' used in an edge but never declared"
            )));
        }

        DagGraph::from_pairs(
            self.tasks
                .into_iter()
                .map(|(name, task)| (name, task.after)),
        )
    }
}
