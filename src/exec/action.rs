// src/exec/action.rs

//! The opaque "node action" capability.
//!
//! A node holds an `Arc<dyn NodeAction>`; the worker pool invokes it once the
//! node is claimed. Production nodes use [`ShellAction`](super::ShellAction);
//! tests and embedders can supply closures through [`FnAction`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::dag::NodeOutcome;

/// Boxed future returned by [`NodeAction::execute`].
///
/// `'static` so the worker pool can run it on its own Tokio task and
/// contain panics.
pub type ActionFuture = Pin<Box<dyn Future<Output = NodeOutcome> + Send + 'static>>;

/// What a node does when it runs.
pub trait NodeAction: Send + Sync {
    /// Start the action for the node called `node`.
    fn execute(&self, node: &str) -> ActionFuture;
}

/// Always succeeds without doing anything. Useful for grouping nodes that
/// only exist to aggregate dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl NodeAction for NoopAction {
    fn execute(&self, _node: &str) -> ActionFuture {
        Box::pin(async { NodeOutcome::Success })
    }
}

/// Adapts an async closure into a [`NodeAction`].
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

impl<F, Fut> NodeAction for FnAction<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = NodeOutcome> + Send + 'static,
{
    fn execute(&self, node: &str) -> ActionFuture {
        Box::pin((self.f)(node.to_string()))
    }
}
