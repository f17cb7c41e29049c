// src/dag/plan.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::dag::builder::PlanBuilder;
use crate::dag::dependency_set::DependenciesState;
use crate::dag::graph::DagGraph;
use crate::dag::node::{Node, NodeId, NodeName, NodeState, SkipReason};
use crate::dag::report::RunSummary;
use crate::errors::{ExecPlanError, Result};

/// Structured result of propagating one terminal node through the plan.
#[derive(Debug, Clone, Default)]
pub struct PlanStep {
    /// Nodes whose dependencies all succeeded as a result of this step.
    pub newly_ready: Vec<Arc<Node>>,
    /// Nodes skipped as a result of this step (transitively).
    pub newly_skipped: Vec<NodeName>,
    /// Whether every node in the plan is now terminal.
    pub finished: bool,
}

/// The full node set of one run plus its aggregate bookkeeping.
///
/// Built once by [`PlanBuilder`]; during execution it is shared between the
/// scheduler and its workers and only mutated through the node state
/// machine and the completion hook.
#[derive(Debug)]
pub struct ExecutionPlan {
    nodes: Vec<Arc<Node>>,
    index: HashMap<NodeName, NodeId>,
    graph: DagGraph,
    dependents: Vec<Vec<NodeId>>,
    downstream: Vec<usize>,
    remaining: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl ExecutionPlan {
    pub(crate) fn new(
        nodes: Vec<Arc<Node>>,
        index: HashMap<NodeName, NodeId>,
        graph: DagGraph,
    ) -> Self {
        let dependents = nodes
            .iter()
            .map(|node| graph.dependents_of(node.id()))
            .collect();
        let downstream = nodes
            .iter()
            .map(|node| graph.downstream_count(node.id()))
            .collect();
        let remaining = AtomicUsize::new(nodes.len());

        Self {
            nodes,
            index,
            graph,
            dependents,
            downstream,
            remaining,
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    /// Build a plan from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        PlanBuilder::from_config(cfg).build()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, indexed by [`NodeId`].
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Arc<Node>> {
        self.index.get(name).and_then(|id| self.node(*id))
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<Node>> {
        self.node_by_name(name)
            .ok_or_else(|| ExecPlanError::NodeNotFound(name.to_string()))
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Direct dependents of `id`, in ordering-key order.
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        self.dependents.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of transitive dependents of `id`.
    pub fn downstream_count(&self, id: NodeId) -> usize {
        self.downstream.get(id.0).copied().unwrap_or(0)
    }

    /// Nodes not yet terminal.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Not started, and every predecessor terminal-and-successful.
    pub fn is_runnable(&self, node: &Node) -> bool {
        node.is_runnable()
    }

    /// Nodes runnable before anything has executed (normally the leaves).
    ///
    /// Each node is returned at most once over the lifetime of the plan,
    /// whether from here or from a [`PlanStep`].
    pub(crate) fn take_initially_ready(&self) -> Vec<Arc<Node>> {
        self.nodes
            .iter()
            .filter(|node| node.is_runnable() && node.mark_queued())
            .cloned()
            .collect()
    }

    /// Completion hook, called exactly once after `node` became terminal.
    ///
    /// Notifies every direct dependent, queues the ones that became runnable
    /// and skips the ones whose dependencies can no longer all succeed. A
    /// skipped node is itself propagated the same way, so a failure reaches
    /// the whole downstream subgraph without executing any of it.
    pub(crate) fn node_finished(&self, node: &Arc<Node>) -> PlanStep {
        debug_assert!(node.is_complete(), "node_finished on non-terminal node");

        let mut step = PlanStep::default();
        let mut worklist = vec![Arc::clone(node)];

        while let Some(done) = worklist.pop() {
            self.record_terminal(&done);

            for dependent_id in self.dependents_of(done.id()) {
                let Some(dependent) = self.node(*dependent_id) else {
                    continue;
                };

                dependent.on_dependency_complete(&done);
                if dependent.state() != NodeState::NotStarted {
                    continue;
                }

                match dependent.dependencies_state() {
                    DependenciesState::NotComplete => {}
                    DependenciesState::CompleteAndSuccessful => {
                        if dependent.mark_queued() {
                            debug!(
                                node = %dependent.name(),
                                node_id = %dependent.id(),
                                "dependencies satisfied; node is runnable"
                            );
                            step.newly_ready.push(Arc::clone(dependent));
                        }
                    }
                    DependenciesState::CompleteAndNotSuccessful => {
                        let reason = dependency_failure_reason(dependent, &done);
                        if dependent.skip(reason.clone()) {
                            warn!(
                                node = %dependent.name(),
                                reason = %reason,
                                "skipping node"
                            );
                            step.newly_skipped.push(dependent.name().to_string());
                            worklist.push(Arc::clone(dependent));
                        }
                    }
                }
            }
        }

        step.finished = self.is_finished();
        step
    }

    /// Skip every node that has not started yet.
    ///
    /// Used once a halted run has no work in flight. The caller guarantees no
    /// completion hook runs concurrently.
    pub(crate) fn skip_remaining(&self, reason: SkipReason) -> Vec<NodeName> {
        let mut skipped = Vec::new();
        for node in &self.nodes {
            if node.skip(reason.clone()) {
                self.record_terminal(node);
                skipped.push(node.name().to_string());
            }
        }
        if !skipped.is_empty() {
            warn!(count = skipped.len(), reason = %reason, "skipped nodes that never started");
        }
        skipped
    }

    /// Per-node outcomes in ordering-key order.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_nodes(&self.nodes)
    }

    fn record_terminal(&self, node: &Node) {
        match node.state() {
            NodeState::Failed => {
                self.failed.fetch_add(1, Ordering::AcqRel);
            }
            NodeState::Skipped => {
                self.skipped.fetch_add(1, Ordering::AcqRel);
            }
            _ => {}
        }
        let remaining = self.remaining.fetch_sub(1, Ordering::AcqRel) - 1;
        info!(
            node = %node.name(),
            node_id = %node.id(),
            outcome = ?node.state(),
            remaining,
            "node reached terminal state"
        );
    }
}

/// Skip reason for `dependent`, naming the predecessor its dependency set
/// recorded as failed (falling back to the node that just completed).
fn dependency_failure_reason(dependent: &Node, completed: &Arc<Node>) -> SkipReason {
    let failed = dependent
        .failed_dependency()
        .unwrap_or_else(|| Arc::clone(completed));
    let dependency = failed.name().to_string();
    let origin = failed.failure_origin().unwrap_or_else(|| dependency.clone());
    SkipReason::DependencyFailed { dependency, origin }
}
