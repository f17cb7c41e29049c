// tests/cancellation.rs

mod common;
use crate::common::{ExecutionLog, TestResult, init_tracing, with_timeout};

use std::sync::Arc;

use tokio::sync::Notify;

use execplan::dag::{FinalOutcome, HaltReason, NodeDefinition, NodeOutcome, PlanBuilder, Scheduler, SkipReason};
use execplan::exec::{FnAction, WorkerPool};
use execplan::types::{FailurePolicy, SchedulingOrder};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_lets_running_node_finish_and_skips_the_rest() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let gate = {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        FnAction::new(move |_name: String| {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            async move {
                started.notify_one();
                release.notified().await;
                NodeOutcome::Success
            }
        })
    };

    let plan = PlanBuilder::new()
        .with_node(NodeDefinition::new("A", Arc::new(gate)))
        .with_node(NodeDefinition::new("B", log.action().shared()).after("A"))
        .with_node(NodeDefinition::new("C", log.action().shared()))
        .build()?;

    let scheduler = Arc::new(Scheduler::new(
        plan,
        FailurePolicy::Continue,
        SchedulingOrder::Declaration,
    ));
    let pool = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { WorkerPool::new(1).run(scheduler).await }
    });

    with_timeout(started.notified()).await;
    scheduler.cancel();
    assert_eq!(scheduler.halt_reason(), Some(HaltReason::Cancelled));
    // A is still running, so nothing has been retired yet.
    assert_eq!(scheduler.running_count(), 1);

    release.notify_one();
    let summary = with_timeout(pool).await??;

    assert!(log.started().is_empty());
    assert_eq!(summary.outcome_of("A"), Some(&FinalOutcome::Succeeded));
    assert_eq!(summary.outcome_of("B"), Some(&FinalOutcome::Skipped(SkipReason::Cancelled)));
    assert_eq!(summary.outcome_of("C"), Some(&FinalOutcome::Skipped(SkipReason::Cancelled)));
    assert!(scheduler.plan().is_finished());
    Ok(())
}

#[tokio::test]
async fn cancel_before_start_runs_nothing() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();

    let plan = PlanBuilder::new()
        .with_node(NodeDefinition::new("A", log.action().shared()))
        .with_node(NodeDefinition::new("B", log.action().shared()).after("A"))
        .build()?;

    let scheduler = Arc::new(Scheduler::new(
        plan,
        FailurePolicy::FailFast,
        SchedulingOrder::Declaration,
    ));
    scheduler.cancel();

    let summary = with_timeout(WorkerPool::new(4).run(Arc::clone(&scheduler))).await?;

    assert!(log.started().is_empty());
    assert_eq!(summary.skipped(), 2);
    assert!(!summary.is_success());
    Ok(())
}

#[tokio::test]
async fn cancel_after_completion_changes_nothing() -> TestResult {
    init_tracing();
    let log = ExecutionLog::new();

    let plan = PlanBuilder::new()
        .with_node(NodeDefinition::new("A", log.action().shared()))
        .build()?;
    let scheduler = Arc::new(Scheduler::new(
        plan,
        FailurePolicy::FailFast,
        SchedulingOrder::Declaration,
    ));

    let summary = with_timeout(WorkerPool::new(1).run(Arc::clone(&scheduler))).await?;
    scheduler.cancel();

    assert!(summary.is_success());
    assert_eq!(scheduler.plan().summary().outcome_of("A"), Some(&FinalOutcome::Succeeded));
    Ok(())
}
