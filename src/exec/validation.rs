// src/exec/validation.rs

//! Pre-execution validation verdict.
//!
//! Before a claimed node's action runs, the worker asks a [`NodeValidator`]
//! to record problems into a [`ValidationContext`]. Any recorded problem is a
//! negative verdict: the node fails with the problems as its detail and the
//! action is never invoked.

use std::fmt;

use crate::dag::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProblem {
    pub message: String,
    /// Only relevant when the node's outputs are meant to be cached.
    pub cacheability_only: bool,
}

impl ValidationProblem {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cacheability_only: false,
        }
    }

    pub fn cacheability(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cacheability_only: true,
        }
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collects problems for one node.
///
/// Cacheability-only problems are dropped for nodes that are not cacheable.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    cacheable: bool,
    problems: Vec<ValidationProblem>,
}

impl ValidationContext {
    pub fn new(cacheable: bool) -> Self {
        Self {
            cacheable,
            problems: Vec::new(),
        }
    }

    pub fn record(&mut self, problem: ValidationProblem) {
        if problem.cacheability_only && !self.cacheable {
            return;
        }
        self.problems.push(problem);
    }

    pub fn problems(&self) -> &[ValidationProblem] {
        &self.problems
    }

    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    /// `None` for a positive verdict, otherwise the failure detail.
    pub fn into_failure(self) -> Option<String> {
        if self.problems.is_empty() {
            return None;
        }
        let joined = self
            .problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Some(format!("validation failed: {joined}"))
    }
}

/// The external validation collaborator.
pub trait NodeValidator: Send + Sync {
    fn validate(&self, node: &Node, ctx: &mut ValidationContext);
}

/// Accepts every node.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl NodeValidator for AcceptAll {
    fn validate(&self, _node: &Node, _ctx: &mut ValidationContext) {}
}

/// Checks a node's declared inputs.
///
/// - a missing input is an error;
/// - an absolute input path on a cacheable node is a cacheability problem,
///   since cached results keyed on it would not be relocatable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredInputsValidator;

impl NodeValidator for DeclaredInputsValidator {
    fn validate(&self, node: &Node, ctx: &mut ValidationContext) {
        for input in node.inputs() {
            if !input.exists() {
                ctx.record(ValidationProblem::error(format!(
                    "declared input '{}' does not exist",
                    input.display()
                )));
            } else if input.is_absolute() {
                ctx.record(ValidationProblem::cacheability(format!(
                    "declared input '{}' is absolute",
                    input.display()
                )));
            }
        }
    }
}
