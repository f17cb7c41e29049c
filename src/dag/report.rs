// src/dag/report.rs

//! Per-node outcomes handed to reporting once a run ends.

use std::fmt;
use std::sync::Arc;

use crate::dag::node::{Node, NodeName, NodeState, SkipReason};

/// Terminal outcome of one node, as reported after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutcome {
    Succeeded,
    /// The node's own action (or validation) failed.
    Failed { detail: String },
    /// The node never executed.
    Skipped(SkipReason),
    /// The node was not terminal when the summary was taken.
    Incomplete(NodeState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub name: NodeName,
    pub outcome: FinalOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    nodes: Vec<NodeReport>,
}

impl RunSummary {
    pub(crate) fn from_nodes(nodes: &[Arc<Node>]) -> Self {
        let nodes = nodes
            .iter()
            .map(|node| {
                let outcome = match node.state() {
                    NodeState::Succeeded => FinalOutcome::Succeeded,
                    NodeState::Failed => FinalOutcome::Failed {
                        detail: node.failure().unwrap_or_default(),
                    },
                    NodeState::Skipped => match node.skip_reason() {
                        Some(reason) => FinalOutcome::Skipped(reason),
                        None => FinalOutcome::Incomplete(NodeState::Skipped),
                    },
                    other => FinalOutcome::Incomplete(other),
                };
                NodeReport {
                    name: node.name().to_string(),
                    outcome,
                }
            })
            .collect();
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeReport] {
        &self.nodes
    }

    pub fn outcome_of(&self, name: &str) -> Option<&FinalOutcome> {
        self.nodes
            .iter()
            .find(|report| report.name == name)
            .map(|report| &report.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, FinalOutcome::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FinalOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FinalOutcome::Skipped(_)))
    }

    /// Names of nodes whose own action failed (not the ones skipped because
    /// of them).
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|r| matches!(r.outcome, FinalOutcome::Failed { .. }))
            .map(|r| r.name.as_str())
    }

    /// Every node ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded() == self.nodes.len()
    }

    fn count(&self, pred: impl Fn(&FinalOutcome) -> bool) -> usize {
        self.nodes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.nodes {
            match &report.outcome {
                FinalOutcome::Succeeded => writeln!(f, "  ok       {}", report.name)?,
                FinalOutcome::Failed { detail } => {
                    writeln!(f, "  FAILED   {} ({detail})", report.name)?
                }
                FinalOutcome::Skipped(reason) => {
                    writeln!(f, "  skipped  {} ({reason})", report.name)?
                }
                FinalOutcome::Incomplete(state) => {
                    writeln!(f, "  {state:?}  {}", report.name)?
                }
            }
        }
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }
}
