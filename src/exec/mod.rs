// src/exec/mod.rs

//! Execution layer.
//!
//! - [`action`] defines the [`NodeAction`] capability each node holds, plus
//!   closure-backed and no-op implementations.
//! - [`shell`] runs a node's command through `tokio::process::Command`.
//! - [`validation`] is the pre-execution verdict: a node with validation
//!   problems fails without its action being invoked.
//! - [`worker_pool`] runs a bounded set of workers that pull claimed nodes
//!   from the [`Scheduler`](crate::dag::Scheduler) and report outcomes back.

pub mod action;
pub mod shell;
pub mod validation;
pub mod worker_pool;

pub use action::{ActionFuture, FnAction, NodeAction, NoopAction};
pub use shell::ShellAction;
pub use validation::{
    AcceptAll, DeclaredInputsValidator, NodeValidator, ValidationContext, ValidationProblem,
};
pub use worker_pool::WorkerPool;
