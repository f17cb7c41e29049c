// src/dag/node.rs

//! A single schedulable unit of work and its state machine.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::dag::dependency_set::{DependenciesState, DependencySet};
use crate::dag::lock;
use crate::errors::{ExecPlanError, Result};
use crate::exec::NodeAction;

/// Canonical node name type (the identity a caller declares).
pub type NodeName = String;

/// Ordering key of a node inside a plan.
///
/// Assigned in declaration order when the plan is built; lower ids are
/// scheduled first when several nodes are ready at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Execution state of a node.
///
/// `NotStarted -> Running -> Succeeded | Failed`, or `NotStarted -> Skipped`
/// when the node can never run. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Succeeded | NodeState::Failed | NodeState::Skipped
        )
    }
}

/// Outcome reported for an executed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Success,
    /// The action (or its validation) failed; the string is diagnostic detail.
    Failed(String),
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Success)
    }
}

/// Why a node was skipped instead of executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A direct predecessor finished unsuccessfully.
    ///
    /// `dependency` is the predecessor this node observed; `origin` is the
    /// node whose own action failed (equal to `dependency` unless the
    /// failure propagated through other skipped nodes).
    DependencyFailed {
        dependency: NodeName,
        origin: NodeName,
    },
    /// The fail-fast policy stopped issuing work after another failure.
    Halted,
    /// The run was cancelled externally.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency, origin } if dependency == origin => {
                write!(f, "dependency '{dependency}' failed")
            }
            SkipReason::DependencyFailed { dependency, origin } => {
                write!(f, "dependency '{dependency}' skipped after '{origin}' failed")
            }
            SkipReason::Halted => write!(f, "run halted after a failure"),
            SkipReason::Cancelled => write!(f, "run cancelled"),
        }
    }
}

#[derive(Debug)]
struct Status {
    state: NodeState,
    /// Set once the node has been handed to the scheduler's ready queue.
    queued: bool,
    failure: Option<String>,
    skip_reason: Option<SkipReason>,
}

/// A unit of work in an [`ExecutionPlan`](crate::dag::ExecutionPlan).
///
/// Each node exclusively owns its [`DependencySet`]. Both the dependency set
/// and the node's own status sit behind separate per-node locks. The only
/// nested acquisition is "own dependency set, then a predecessor's status".
pub struct Node {
    id: NodeId,
    name: NodeName,
    action: Arc<dyn NodeAction>,
    inputs: Vec<PathBuf>,
    cacheable: bool,
    status: Mutex<Status>,
    dependencies: Mutex<DependencySet>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<NodeName>, action: Arc<dyn NodeAction>) -> Self {
        Self {
            id,
            name: name.into(),
            action,
            inputs: Vec::new(),
            cacheable: false,
            status: Mutex::new(Status {
                state: NodeState::NotStarted,
                queued: false,
                failure: None,
                skip_reason: None,
            }),
            dependencies: Mutex::new(DependencySet::default()),
        }
    }

    pub(crate) fn with_inputs(mut self, inputs: Vec<PathBuf>, cacheable: bool) -> Self {
        self.inputs = inputs;
        self.cacheable = cacheable;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Arc<dyn NodeAction> {
        Arc::clone(&self.action)
    }

    /// Declared input paths, as handed to the validator.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn state(&self) -> NodeState {
        lock(&self.status).state
    }

    /// Terminal state reached (successful, failed or skipped).
    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Terminal and successful.
    pub fn is_successful(&self) -> bool {
        self.state() == NodeState::Succeeded
    }

    /// Diagnostic detail recorded when the node failed.
    pub fn failure(&self) -> Option<String> {
        lock(&self.status).failure.clone()
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        lock(&self.status).skip_reason.clone()
    }

    /// Name of the node whose own failure made this node unsuccessful.
    ///
    /// `None` while the node is not terminal-and-unsuccessful, or when it was
    /// skipped by a halt or cancellation rather than by a failure.
    pub fn failure_origin(&self) -> Option<NodeName> {
        let status = lock(&self.status);
        match (&status.state, &status.skip_reason) {
            (NodeState::Failed, _) => Some(self.name.clone()),
            (NodeState::Skipped, Some(SkipReason::DependencyFailed { origin, .. })) => {
                Some(origin.clone())
            }
            _ => None,
        }
    }

    /// Registers a direct predecessor. Only valid while the plan is being built.
    pub fn add_dependency(&self, node: Arc<Node>) {
        lock(&self.dependencies).add_dependency(node);
    }

    /// Push notification: `node` (a direct predecessor) became terminal.
    pub fn on_dependency_complete(&self, node: &Node) {
        lock(&self.dependencies).on_node_complete(node);
    }

    /// Aggregate state of this node's predecessors.
    pub fn dependencies_state(&self) -> DependenciesState {
        lock(&self.dependencies).state()
    }

    /// Direct predecessors in ordering-key order.
    pub fn dependencies(&self) -> Vec<Arc<Node>> {
        lock(&self.dependencies)
            .ordered_dependencies()
            .cloned()
            .collect()
    }

    /// The predecessor whose failure pinned this node's dependencies to
    /// `CompleteAndNotSuccessful`, if any.
    pub fn failed_dependency(&self) -> Option<Arc<Node>> {
        lock(&self.dependencies).failed_dependency().cloned()
    }

    /// Runnable: not started and every predecessor terminal-and-successful.
    pub fn is_runnable(&self) -> bool {
        self.state() == NodeState::NotStarted
            && self.dependencies_state() == DependenciesState::CompleteAndSuccessful
    }

    /// Mark the node as handed to the ready queue.
    ///
    /// Returns `true` only for the first caller while the node is still
    /// `NotStarted`, so concurrent completions of two predecessors cannot
    /// enqueue the same node twice.
    pub(crate) fn mark_queued(&self) -> bool {
        let mut status = lock(&self.status);
        if status.state != NodeState::NotStarted || status.queued {
            return false;
        }
        status.queued = true;
        true
    }

    /// `NotStarted -> Running`.
    pub fn claim(&self) -> Result<()> {
        let mut status = lock(&self.status);
        self.transition(&mut status, NodeState::NotStarted, NodeState::Running)
    }

    /// `Running -> Succeeded | Failed`. Completing a node twice is an error.
    pub fn finish(&self, outcome: NodeOutcome) -> Result<()> {
        let mut status = lock(&self.status);
        match outcome {
            NodeOutcome::Success => {
                self.transition(&mut status, NodeState::Running, NodeState::Succeeded)
            }
            NodeOutcome::Failed(detail) => {
                self.transition(&mut status, NodeState::Running, NodeState::Failed)?;
                status.failure = Some(detail);
                Ok(())
            }
        }
    }

    /// `NotStarted -> Skipped`.
    ///
    /// Returns `false` (and changes nothing) when the node already left
    /// `NotStarted`; several threads may race to skip the same dependent and
    /// exactly one of them wins.
    pub(crate) fn skip(&self, reason: SkipReason) -> bool {
        let mut status = lock(&self.status);
        if status.state != NodeState::NotStarted {
            return false;
        }
        status.state = NodeState::Skipped;
        status.skip_reason = Some(reason);
        true
    }

    fn transition(&self, status: &mut Status, from: NodeState, to: NodeState) -> Result<()> {
        if status.state != from {
            return Err(ExecPlanError::InvalidTransition {
                node: self.name.clone(),
                from: status.state,
                to,
            });
        }
        status.state = to;
        Ok(())
    }
}
