// src/dag/mod.rs

//! Dependency tracking and scheduling.
//!
//! - [`node`] is a unit of work and its one-way state machine.
//! - [`dependency_set`] tracks, per node, which predecessors are still
//!   outstanding and whether any of them failed.
//! - [`builder`] turns declarations into an [`ExecutionPlan`], rejecting
//!   unknown dependencies and cycles before anything runs.
//! - [`graph`] is a petgraph view of the declared edges used for ordering
//!   heuristics and dry-run output.
//! - [`plan`] owns the nodes and propagates completions to dependents.
//! - [`scheduler`] hands ready nodes to workers, one claim per node.
//! - [`report`] is the per-node summary handed back once a run ends.

pub mod builder;
pub mod dependency_set;
pub mod graph;
pub mod node;
pub mod plan;
pub mod report;
pub mod scheduler;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use builder::{NodeDefinition, PlanBuilder};
pub use dependency_set::{DependenciesState, DependencySet};
pub use graph::DagGraph;
pub use node::{Node, NodeId, NodeName, NodeOutcome, NodeState, SkipReason};
pub use plan::{ExecutionPlan, PlanStep};
pub use report::{FinalOutcome, NodeReport, RunSummary};
pub use scheduler::{HaltReason, Scheduler, Selection};

/// Lock a mutex, recovering the data if another thread panicked while
/// holding it. Every critical section in this module leaves the guarded
/// state consistent before doing anything that could panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
