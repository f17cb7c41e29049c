// src/dag/builder.rs

//! Build phase: turn `(node, dependencies)` declarations into an
//! [`ExecutionPlan`].
//!
//! Unknown dependencies and cycles are configuration errors reported here,
//! before any node can run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigFile;
use crate::dag::graph::DagGraph;
use crate::dag::node::{Node, NodeId, NodeName};
use crate::dag::plan::ExecutionPlan;
use crate::errors::{ExecPlanError, Result};
use crate::exec::{NodeAction, ShellAction};

/// Declaration of a single node, as supplied by the graph-construction
/// collaborator (a config file, or code).
#[derive(Clone)]
pub struct NodeDefinition {
    pub name: NodeName,
    /// Direct predecessors, by name.
    pub dependencies: Vec<NodeName>,
    pub action: Arc<dyn NodeAction>,
    pub inputs: Vec<PathBuf>,
    pub cacheable: bool,
}

impl std::fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("inputs", &self.inputs)
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}

impl NodeDefinition {
    pub fn new(name: impl Into<NodeName>, action: Arc<dyn NodeAction>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            action,
            inputs: Vec::new(),
            cacheable: false,
        }
    }

    pub fn after(mut self, dependency: impl Into<NodeName>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }
}

/// Collects node declarations; ordering keys follow insertion order.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    definitions: Vec<NodeDefinition>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations from a validated config file, one shell action per task.
    ///
    /// Tasks are declared in the config's key order, which therefore defines
    /// their ordering keys.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut builder = Self::new();
        for (name, task) in cfg.task.iter() {
            let action: Arc<dyn NodeAction> = Arc::new(ShellAction::new(task.cmd.clone()));
            let mut def = NodeDefinition::new(name.clone(), action).cacheable(task.cacheable);
            def.dependencies = task.after.clone();
            def.inputs = task.inputs.iter().map(PathBuf::from).collect();
            builder.add(def);
        }
        builder
    }

    pub fn add(&mut self, definition: NodeDefinition) -> &mut Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_node(mut self, definition: NodeDefinition) -> Self {
        self.add(definition);
        self
    }

    /// Resolve names, reject cycles, and wire every node's dependency set.
    pub fn build(self) -> Result<ExecutionPlan> {
        let mut index: HashMap<NodeName, NodeId> = HashMap::new();
        for (i, def) in self.definitions.iter().enumerate() {
            if index.insert(def.name.clone(), NodeId(i)).is_some() {
                return Err(ExecPlanError::DuplicateNode(def.name.clone()));
            }
        }

        let mut deps: Vec<Vec<NodeId>> = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            let mut resolved = Vec::with_capacity(def.dependencies.len());
            for dep in &def.dependencies {
                let id = index
                    .get(dep)
                    .copied()
                    .ok_or_else(|| ExecPlanError::UnknownDependency {
                        node: def.name.clone(),
                        dependency: dep.clone(),
                    })?;
                if !resolved.contains(&id) {
                    resolved.push(id);
                }
            }
            deps.push(resolved);
        }

        if let Some(cycle) = find_cycle(&deps) {
            let cycle = cycle
                .into_iter()
                .map(|id| self.definitions[id.0].name.clone())
                .collect();
            return Err(ExecPlanError::DependencyCycle { cycle });
        }

        let nodes: Vec<Arc<Node>> = self
            .definitions
            .into_iter()
            .enumerate()
            .map(|(i, def)| {
                Arc::new(
                    Node::new(NodeId(i), def.name, def.action)
                        .with_inputs(def.inputs, def.cacheable),
                )
            })
            .collect();

        for (node, node_deps) in nodes.iter().zip(&deps) {
            for dep in node_deps {
                node.add_dependency(Arc::clone(&nodes[dep.0]));
            }
        }

        let graph = DagGraph::from_edges(
            nodes
                .iter()
                .zip(&deps)
                .map(|(node, node_deps)| (node.id(), node_deps.as_slice())),
        );

        debug!(nodes = nodes.len(), "execution plan built");
        Ok(ExecutionPlan::new(nodes, index, graph))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search with a three-colour marker over "depends on" edges.
///
/// Returns the first cycle found as a path that starts and ends with the
/// same node, e.g. `[a, b, a]` for "a depends on b, b depends on a".
fn find_cycle(deps: &[Vec<NodeId>]) -> Option<Vec<NodeId>> {
    let mut marks = vec![Mark::Unvisited; deps.len()];

    for start in 0..deps.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // (node, index of the next dependency to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::InProgress;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let Some(dep) = deps[node].get(next).map(|d| d.0) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[dep] {
                Mark::Unvisited => {
                    marks[dep] = Mark::InProgress;
                    stack.push((dep, 0));
                }
                Mark::InProgress => {
                    let from = stack
                        .iter()
                        .position(|(n, _)| *n == dep)
                        .unwrap_or_default();
                    let mut cycle: Vec<NodeId> =
                        stack[from..].iter().map(|(n, _)| NodeId(*n)).collect();
                    cycle.push(NodeId(dep));
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }

    None
}
