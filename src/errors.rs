// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::NodeState;

#[derive(Error, Debug)]
pub enum ExecPlanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node declared more than once: {0}")]
    DuplicateNode(String),

    #[error("node '{node}' has unknown dependency '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// A node was asked to move between states in a way the state machine
    /// does not allow (e.g. completing it twice).
    #[error("invalid state transition for node '{node}': {from:?} -> {to:?}")]
    InvalidTransition {
        node: String,
        from: NodeState,
        to: NodeState,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ExecPlanError>;
