// src/exec/worker_pool.rs

//! Bounded pool of workers pulling from the scheduler.
//!
//! Each worker loops: claim a ready node, validate it, run its action, report
//! the outcome. Workers stop when the scheduler reports there is nothing left
//! to hand out (plan finished, fail-fast halt, or cancellation).

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{Node, NodeOutcome, RunSummary, Scheduler};
use crate::errors::{ExecPlanError, Result};
use crate::exec::validation::{AcceptAll, NodeValidator, ValidationContext};

pub struct WorkerPool {
    max_workers: usize,
    validator: Arc<dyn NodeValidator>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// `max_workers` is clamped to at least 1.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            validator: Arc::new(AcceptAll),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn NodeValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run the scheduler's plan to completion and summarise the outcomes.
    ///
    /// Node failures are part of the summary, not errors. An `Err` means an
    /// internal consistency violation or a worker task that died.
    pub async fn run(&self, scheduler: Arc<Scheduler>) -> Result<RunSummary> {
        info!(
            workers = self.max_workers,
            nodes = scheduler.plan().len(),
            "worker pool started"
        );

        let mut workers = JoinSet::new();
        for worker in 0..self.max_workers {
            let scheduler = Arc::clone(&scheduler);
            let validator = Arc::clone(&self.validator);
            workers.spawn(worker_loop(worker, scheduler, validator));
        }

        // Joined in completion order, so the first failing worker cancels
        // the run even while others are parked waiting for work.
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(ExecPlanError::Other(anyhow::anyhow!(
                    "worker task failed: {join_err}"
                ))),
            };
            if let Err(err) = result {
                error!(error = %err, "worker stopped with an error");
                scheduler.cancel();
                first_error.get_or_insert(err);
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let summary = scheduler.plan().summary();
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "worker pool finished"
        );
        Ok(summary)
    }
}

async fn worker_loop(
    worker: usize,
    scheduler: Arc<Scheduler>,
    validator: Arc<dyn NodeValidator>,
) -> Result<()> {
    debug!(worker, "worker started");

    while let Some(node) = scheduler.select_next().await? {
        let outcome = execute_node(worker, &node, validator.as_ref()).await;
        scheduler.report_complete(&node, outcome)?;
    }

    debug!(worker, "worker finished");
    Ok(())
}

async fn execute_node(worker: usize, node: &Arc<Node>, validator: &dyn NodeValidator) -> NodeOutcome {
    let mut ctx = ValidationContext::new(node.is_cacheable());
    validator.validate(node, &mut ctx);
    if let Some(detail) = ctx.into_failure() {
        warn!(worker, node = %node.name(), %detail, "node rejected before execution");
        return NodeOutcome::Failed(detail);
    }

    info!(worker, node = %node.name(), "executing node");
    let fut = node.action().execute(node.name());

    // A panicking action is a failed node, not a dead worker.
    let outcome = match tokio::spawn(fut).await {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            NodeOutcome::Failed(format!("action panicked: {join_err}"))
        }
        Err(join_err) => NodeOutcome::Failed(format!("action aborted: {join_err}")),
    };

    match &outcome {
        NodeOutcome::Success => info!(worker, node = %node.name(), "node succeeded"),
        NodeOutcome::Failed(detail) => {
            warn!(worker, node = %node.name(), %detail, "node failed")
        }
    }
    outcome
}
