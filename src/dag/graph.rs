// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{LoaddagError, Result};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory DAG keyed by task name.
///
/// Nodes keep the order they were declared in, so the topological order is
/// stable across runs.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    declared: Vec<String>,
}

impl DagGraph {
    /// Build a DAG from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_tasks(&cfg.task)
    }

    /// Build a DAG from task configs whose `after` lists were validated.
    pub fn from_tasks(tasks: &BTreeMap<String, TaskConfig>) -> Self {
        Self::link(
            tasks
                .iter()
                .map(|(name, task)| (name.clone(), task.after.clone()))
                .collect(),
        )
    }

    /// Build and validate a DAG from `(task, upstream tasks)` pairs.
    ///
    /// Repeated upstream entries are collapsed (with a warning); unknown
    /// upstreams, self edges and cycles are errors.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut declared: Vec<(String, Vec<String>)> = Vec::new();
        let mut seen = HashSet::new();

        for (name, deps) in pairs {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(LoaddagError::ConfigError(format!(
                    "task '{name}' declared twice"
                )));
            }

            let mut unique = Vec::new();
            for dep in deps.into_iter().map(Into::into) {
                if unique.contains(&dep) {
                    warn!(task = %name, upstream = %dep, "duplicate dependency ignored");
                } else {
                    unique.push(dep);
                }
            }
            declared.push((name, unique));
        }

        for (name, deps) in declared.iter() {
            for dep in deps {
                if dep == name {
                    return Err(LoaddagError::ConfigError(format!(
                        "task '{name}' cannot depend on itself"
                    )));
                }
                if !seen.contains(dep) {
                    return Err(LoaddagError::TaskNotFound(format!(
                        "'{dep}' (upstream of '{name}')"
                    )));
                }
            }
        }

        let graph = Self::link(declared);
        graph.try_topological_order()?;
        Ok(graph)
    }

    fn link(declared: Vec<(String, Vec<String>)>) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let order: Vec<String> = declared.iter().map(|(n, _)| n.clone()).collect();

        for (name, deps) in declared {
            nodes.insert(
                name,
                DagNode {
                    deps,
                    dependents: Vec::new(),
                },
            );
        }

        for task_name in order.iter() {
            let deps = nodes
                .get(task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        Self {
            nodes,
            declared: order,
        }
    }

    /// Return all task names, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without dependencies.
    pub fn roots(&self) -> Vec<String> {
        self.tasks()
            .filter(|name| self.dependencies_of(name).is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Every task reachable downstream of `name`.
    pub fn descendants_of(&self, name: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        let mut stack: Vec<&str> = self.dependents_of(name).iter().map(|s| s.as_str()).collect();
        while let Some(next) = stack.pop() {
            if out.insert(next.to_string()) {
                stack.extend(self.dependents_of(next).iter().map(|s| s.as_str()));
            }
        }
        out
    }

    fn try_topological_order(&self) -> Result<Vec<String>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.tasks() {
            graph.add_node(name);
        }
        for name in self.tasks() {
            for dep in self.dependencies_of(name) {
                graph.add_edge(dep.as_str(), name, ());
            }
        }

        toposort(&graph, None)
            .map(|order| order.into_iter().map(str::to_string).collect())
            .map_err(|cycle| {
                LoaddagError::DagCycle(format!(
                    "cycle detected in task DAG involving task '{}'",
                    cycle.node_id()
                ))
            })
    }

    /// A valid execution order: every task appears after all its dependencies.
    ///
    /// Graphs built through [`DagGraph::from_pairs`] or a validated config are
    /// acyclic, so this only fails for hand-assembled cyclic input.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        self.try_topological_order()
    }
}
