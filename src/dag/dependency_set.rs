// src/dag/dependency_set.rs

//! Per-node tracking of outstanding predecessors.
//!
//! A [`DependencySet`] answers "may this node run yet, and if not, why"
//! without rescanning already-resolved predecessors on every check:
//!
//! - predecessors push their completion via [`DependencySet::on_node_complete`];
//! - [`DependencySet::state`] lazily reconciles whatever is still in
//!   `waiting_for` the first time it is read after a change ("pruning"), which
//!   also covers predecessors that became terminal before anyone pushed.
//!
//! The set itself is not synchronised; its owning [`Node`] keeps it behind a
//! per-node mutex.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dag::node::{Node, NodeId};

/// Aggregate state of a node's direct predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependenciesState {
    /// At least one predecessor is not terminal yet and none has failed.
    NotComplete,
    /// Every predecessor is terminal and successful (or there are none).
    CompleteAndSuccessful,
    /// At least one predecessor is terminal and unsuccessful.
    CompleteAndNotSuccessful,
}

#[derive(Debug, Default)]
pub struct DependencySet {
    /// `None` until the first dependency is added, so leaf nodes allocate nothing.
    ordered: Option<BTreeMap<NodeId, Arc<Node>>>,
    /// Cleared to `None` once a failure pins the aggregate state. Keyed like
    /// `ordered`, so reconciliation visits predecessors in ordering-key order.
    waiting_for: Option<BTreeMap<NodeId, Arc<Node>>>,
    has_failures: bool,
    failed_dependency: Option<Arc<Node>>,
    pruned: bool,
}

impl DependencySet {
    /// Direct predecessors in ordering-key order.
    pub fn ordered_dependencies(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.ordered.iter().flat_map(|deps| deps.values())
    }

    pub fn len(&self) -> usize {
        self.ordered.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of predecessors still being tracked.
    pub fn waiting_count(&self) -> usize {
        self.waiting_for.as_ref().map_or(0, BTreeMap::len)
    }

    pub fn has_failures(&self) -> bool {
        self.has_failures
    }

    /// The first predecessor observed terminal-and-unsuccessful.
    pub fn failed_dependency(&self) -> Option<&Arc<Node>> {
        self.failed_dependency.as_ref()
    }

    /// Register a direct predecessor (deduplicated by node id).
    pub fn add_dependency(&mut self, node: Arc<Node>) {
        let id = node.id();
        self.ordered
            .get_or_insert_with(BTreeMap::new)
            .insert(id, Arc::clone(&node));
        self.waiting_for
            .get_or_insert_with(BTreeMap::new)
            .insert(id, node);
        self.pruned = false;
    }

    /// A predecessor reached a terminal state.
    ///
    /// Notifications for nodes that are not (or no longer) tracked are
    /// ignored.
    pub fn on_node_complete(&mut self, node: &Node) {
        let Some(waiting_for) = self.waiting_for.as_mut() else {
            return;
        };

        if let Some(removed) = waiting_for.remove(&node.id()) {
            if !node.is_successful() {
                self.record_failure(removed);
            }
        }
    }

    /// Reconcile any pending entries, then report the aggregate state.
    ///
    /// Once this returns `CompleteAndSuccessful` or `CompleteAndNotSuccessful`
    /// it keeps returning that value: predecessors never leave a terminal
    /// state and a recorded failure is never cleared.
    pub fn state(&mut self) -> DependenciesState {
        if !self.pruned {
            self.prune();
            self.pruned = true;
        }

        if self.has_failures {
            DependenciesState::CompleteAndNotSuccessful
        } else if self.waiting_for.as_ref().is_none_or(BTreeMap::is_empty) {
            DependenciesState::CompleteAndSuccessful
        } else {
            DependenciesState::NotComplete
        }
    }

    fn prune(&mut self) {
        let Some(waiting_for) = self.waiting_for.as_mut() else {
            return;
        };

        let mut failed = None;
        waiting_for.retain(|_, dep| {
            if failed.is_some() || !dep.is_complete() {
                return true;
            }
            if !dep.is_successful() {
                failed = Some(Arc::clone(dep));
            }
            false
        });

        if let Some(dep) = failed {
            self.record_failure(dep);
        }
    }

    fn record_failure(&mut self, dep: Arc<Node>) {
        self.has_failures = true;
        self.waiting_for = None;
        if self.failed_dependency.is_none() {
            self.failed_dependency = Some(dep);
        }
    }
}
