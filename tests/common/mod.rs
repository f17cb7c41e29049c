#![allow(dead_code)]

pub use execplan_test_utils::builders;
pub use execplan_test_utils::{ExecutionLog, RecordingAction, init_tracing, with_timeout};

use std::sync::Arc;

use execplan::dag::{ExecutionPlan, RunSummary, Scheduler};
use execplan::exec::WorkerPool;
use execplan::types::{FailurePolicy, SchedulingOrder};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Run `plan` to completion on a pool of `workers`, with a timeout.
pub async fn run_plan(
    plan: ExecutionPlan,
    policy: FailurePolicy,
    workers: usize,
) -> (Arc<Scheduler>, RunSummary) {
    let scheduler = Arc::new(Scheduler::new(plan, policy, SchedulingOrder::Declaration));
    let summary = with_timeout(WorkerPool::new(workers).run(Arc::clone(&scheduler)))
        .await
        .expect("worker pool returned an internal error");
    (scheduler, summary)
}
