// src/dag/scheduler.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::dag::lock;
use crate::dag::node::{Node, NodeId, NodeName, NodeOutcome, SkipReason};
use crate::dag::plan::{ExecutionPlan, PlanStep};
use crate::errors::Result;
use crate::types::{FailurePolicy, SchedulingOrder};

/// Why the scheduler stopped handing out new work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// A node failed under [`FailurePolicy::FailFast`].
    Failure { node: NodeName },
    /// [`Scheduler::cancel`] was called.
    Cancelled,
}

impl HaltReason {
    fn skip_reason(&self) -> SkipReason {
        match self {
            HaltReason::Failure { .. } => SkipReason::Halted,
            HaltReason::Cancelled => SkipReason::Cancelled,
        }
    }
}

/// Result of a non-blocking selection attempt.
#[derive(Debug)]
pub enum Selection {
    /// This caller now owns the node; it is `Running`.
    Claimed(Arc<Node>),
    /// Nothing is runnable right now, but work is still in flight.
    Wait,
    /// No more work will be handed out.
    Finished,
}

/// Entry in the ready heap. The heap is a max-heap, so higher priority wins
/// and among equal priorities the lower ordering key wins.
#[derive(Debug, PartialEq, Eq)]
struct ReadyEntry {
    priority: usize,
    id: NodeId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    ready: BinaryHeap<ReadyEntry>,
    running: usize,
    halted: Option<HaltReason>,
}

/// Hands ready nodes to workers, one claim per node.
///
/// The scheduler is responsible for:
/// - keeping the set of runnable-but-unclaimed nodes, ordered
/// - claiming a node (`NotStarted -> Running`) for exactly one worker
/// - recording outcomes and driving the plan's completion hook
/// - applying the failure policy and external cancellation
///
/// Dependency propagation happens outside the scheduler's own lock, under
/// the per-node locks; only the resulting ready set is merged in here.
#[derive(Debug)]
pub struct Scheduler {
    plan: Arc<ExecutionPlan>,
    policy: FailurePolicy,
    order: SchedulingOrder,
    state: Mutex<DispatchState>,
    wakeup: Notify,
}

impl Scheduler {
    pub fn new(plan: ExecutionPlan, policy: FailurePolicy, order: SchedulingOrder) -> Self {
        Self::from_shared(Arc::new(plan), policy, order)
    }

    pub fn from_shared(
        plan: Arc<ExecutionPlan>,
        policy: FailurePolicy,
        order: SchedulingOrder,
    ) -> Self {
        let scheduler = Self {
            plan,
            policy,
            order,
            state: Mutex::new(DispatchState::default()),
            wakeup: Notify::new(),
        };

        let initial = scheduler.plan.take_initially_ready();
        debug!(
            ready = initial.len(),
            nodes = scheduler.plan.len(),
            ?policy,
            ?order,
            "scheduler: seeded initial ready nodes"
        );
        {
            let mut state = lock(&scheduler.state);
            for node in &initial {
                let entry = scheduler.entry_for(node);
                state.ready.push(entry);
            }
        }
        scheduler
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn shared_plan(&self) -> Arc<ExecutionPlan> {
        Arc::clone(&self.plan)
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn running_count(&self) -> usize {
        lock(&self.state).running
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        lock(&self.state).halted.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halt_reason().is_some()
    }

    /// Claim the best ready node without waiting.
    pub fn try_select_next(&self) -> Result<Selection> {
        let mut state = lock(&self.state);

        if state.halted.is_some() {
            return Ok(Selection::Finished);
        }

        if let Some(entry) = state.ready.pop() {
            if let Some(node) = self.plan.node(entry.id).cloned() {
                node.claim()?;
                state.running += 1;
                info!(
                    node = %node.name(),
                    node_id = %node.id(),
                    running = state.running,
                    "claimed node for execution"
                );
                return Ok(Selection::Claimed(node));
            }
        }

        if self.plan.is_finished() {
            Ok(Selection::Finished)
        } else {
            Ok(Selection::Wait)
        }
    }

    /// Claim the next ready node, waiting while work is in flight.
    ///
    /// Returns `Ok(None)` once the plan is finished or the scheduler halted.
    pub async fn select_next(&self) -> Result<Option<Arc<Node>>> {
        loop {
            // Register interest before looking, so a completion landing
            // between the check and the await still wakes us.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_select_next()? {
                Selection::Claimed(node) => return Ok(Some(node)),
                Selection::Finished => return Ok(None),
                Selection::Wait => notified.await,
            }
        }
    }

    /// Record the outcome of a claimed node and propagate it.
    ///
    /// Reporting a node twice, or reporting one that was never claimed, is an
    /// [`InvalidTransition`](crate::errors::ExecPlanError::InvalidTransition).
    pub fn report_complete(&self, node: &Arc<Node>, outcome: NodeOutcome) -> Result<PlanStep> {
        let failed = !outcome.is_success();
        node.finish(outcome)?;

        let mut step = self.plan.node_finished(node);

        {
            let mut state = lock(&self.state);
            state.running = state.running.saturating_sub(1);

            if failed && self.policy == FailurePolicy::FailFast && state.halted.is_none() {
                warn!(
                    node = %node.name(),
                    "node failed; fail-fast policy stops issuing new work"
                );
                state.halted = Some(HaltReason::Failure {
                    node: node.name().to_string(),
                });
            }

            if state.halted.is_some() {
                // Runnable nodes will never be claimed now; they are skipped
                // together with everything else once in-flight work drains.
                step.newly_ready.clear();
                self.drain_if_idle(&mut state, &mut step);
            } else {
                for ready in &step.newly_ready {
                    let entry = self.entry_for(ready);
                    state.ready.push(entry);
                }
            }
        }

        self.wakeup.notify_waiters();
        Ok(step)
    }

    /// Stop handing out work. Running nodes finish normally; nodes that never
    /// started are skipped once nothing is running.
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.state);
            if state.halted.is_none() {
                info!(running = state.running, "scheduler: cancellation requested");
                state.halted = Some(HaltReason::Cancelled);
            }
            let mut step = PlanStep::default();
            self.drain_if_idle(&mut state, &mut step);
        }
        self.wakeup.notify_waiters();
    }

    /// Once halted with nothing in flight, retire every unstarted node.
    fn drain_if_idle(&self, state: &mut DispatchState, step: &mut PlanStep) {
        let Some(reason) = state.halted.as_ref() else {
            return;
        };
        if state.running > 0 {
            return;
        }
        state.ready.clear();
        let skipped = self.plan.skip_remaining(reason.skip_reason());
        step.newly_skipped.extend(skipped);
        step.finished = self.plan.is_finished();
    }

    fn entry_for(&self, node: &Node) -> ReadyEntry {
        let priority = match self.order {
            SchedulingOrder::Declaration => 0,
            SchedulingOrder::MostDependents => self.plan.downstream_count(node.id()),
        };
        ReadyEntry {
            priority,
            id: node.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dag::builder::{NodeDefinition, PlanBuilder};
    use crate::dag::node::NodeState;
    use crate::dag::report::FinalOutcome;
    use crate::errors::ExecPlanError;
    use crate::exec::NoopAction;

    fn def(name: &str) -> NodeDefinition {
        NodeDefinition::new(name, Arc::new(NoopAction))
    }

    fn scheduler(builder: PlanBuilder, policy: FailurePolicy) -> Scheduler {
        Scheduler::new(builder.build().unwrap(), policy, SchedulingOrder::Declaration)
    }

    fn claim(s: &Scheduler) -> Arc<Node> {
        match s.try_select_next().unwrap() {
            Selection::Claimed(node) => node,
            other => panic!("expected a claimed node, got {other:?}"),
        }
    }

    fn assert_wait(s: &Scheduler) {
        assert!(matches!(s.try_select_next().unwrap(), Selection::Wait));
    }

    fn assert_finished(s: &Scheduler) {
        assert!(matches!(s.try_select_next().unwrap(), Selection::Finished));
    }

    #[test]
    fn ties_are_broken_by_ordering_key_not_name() {
        let s = scheduler(
            PlanBuilder::new()
                .with_node(def("zeta"))
                .with_node(def("alpha"))
                .with_node(def("mid")),
            FailurePolicy::Continue,
        );

        let order: Vec<_> = (0..3).map(|_| claim(&s).name().to_string()).collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
        assert_eq!(s.running_count(), 3);
        assert_wait(&s);
    }

    #[test]
    fn most_dependents_order_prefers_the_critical_path() {
        let plan = PlanBuilder::new()
            .with_node(def("lonely"))
            .with_node(def("hub"))
            .with_node(def("x").after("hub"))
            .with_node(def("y").after("x"))
            .build()
            .unwrap();
        let s = Scheduler::new(plan, FailurePolicy::Continue, SchedulingOrder::MostDependents);

        assert_eq!(claim(&s).name(), "hub");
        assert_eq!(claim(&s).name(), "lonely");
    }

    #[test]
    fn a_claimed_node_is_never_handed_out_again() {
        let s = scheduler(
            PlanBuilder::new()
                .with_node(def("a"))
                .with_node(def("b").after("a")),
            FailurePolicy::Continue,
        );

        let a = claim(&s);
        assert_eq!(a.state(), NodeState::Running);
        assert_wait(&s);

        let step = s.report_complete(&a, NodeOutcome::Success).unwrap();
        assert_eq!(step.newly_ready.len(), 1);
        let b = claim(&s);
        assert_eq!(b.name(), "b");
        assert_wait(&s);

        let step = s.report_complete(&b, NodeOutcome::Success).unwrap();
        assert!(step.finished);
        assert_finished(&s);
    }

    #[test]
    fn reporting_twice_is_rejected() {
        let s = scheduler(PlanBuilder::new().with_node(def("a")), FailurePolicy::Continue);
        let a = claim(&s);
        s.report_complete(&a, NodeOutcome::Success).unwrap();

        let err = s
            .report_complete(&a, NodeOutcome::Failed("again".into()))
            .unwrap_err();
        assert!(matches!(err, ExecPlanError::InvalidTransition { .. }));
        assert_eq!(s.plan().remaining(), 0);
        assert_eq!(s.plan().failed_count(), 0);
    }

    fn failure_graph() -> PlanBuilder {
        PlanBuilder::new()
            .with_node(def("a"))
            .with_node(def("b"))
            .with_node(def("c").after("a"))
            .with_node(def("d"))
    }

    #[test]
    fn continue_policy_keeps_independent_work_going() {
        let s = scheduler(failure_graph(), FailurePolicy::Continue);
        let a = claim(&s);
        let b = claim(&s);

        let step = s.report_complete(&a, NodeOutcome::Failed("boom".into())).unwrap();
        assert_eq!(step.newly_skipped, vec!["c"]);
        assert!(!s.is_halted());

        let d = claim(&s);
        assert_eq!(d.name(), "d");
        s.report_complete(&b, NodeOutcome::Success).unwrap();
        let step = s.report_complete(&d, NodeOutcome::Success).unwrap();
        assert!(step.finished);

        let summary = s.plan().summary();
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.skipped(), 1);
    }

    #[test]
    fn fail_fast_lets_running_work_finish_and_starts_nothing_new() {
        let s = scheduler(failure_graph(), FailurePolicy::FailFast);
        let a = claim(&s);
        let b = claim(&s);

        let step = s.report_complete(&a, NodeOutcome::Failed("boom".into())).unwrap();
        assert_eq!(step.newly_skipped, vec!["c"]);
        assert_eq!(
            s.halt_reason(),
            Some(HaltReason::Failure { node: "a".into() })
        );
        assert_finished(&s);
        assert_eq!(b.state(), NodeState::Running);

        let step = s.report_complete(&b, NodeOutcome::Success).unwrap();
        assert_eq!(step.newly_skipped, vec!["d"]);
        assert!(step.finished);

        let summary = s.plan().summary();
        assert_eq!(summary.outcome_of("b"), Some(&FinalOutcome::Succeeded));
        assert_eq!(
            summary.outcome_of("c"),
            Some(&FinalOutcome::Skipped(SkipReason::DependencyFailed {
                dependency: "a".into(),
                origin: "a".into(),
            }))
        );
        assert_eq!(
            summary.outcome_of("d"),
            Some(&FinalOutcome::Skipped(SkipReason::Halted))
        );
    }

    #[test]
    fn cancel_while_idle_skips_everything_left() {
        let s = scheduler(failure_graph(), FailurePolicy::Continue);
        s.cancel();
        assert_finished(&s);
        assert!(s.plan().is_finished());
        assert_eq!(s.plan().skipped_count(), 4);
    }

    #[test]
    fn cancel_waits_for_running_nodes() {
        let s = scheduler(failure_graph(), FailurePolicy::Continue);
        let a = claim(&s);
        s.cancel();
        assert_finished(&s);
        assert!(!s.plan().is_finished());

        let step = s.report_complete(&a, NodeOutcome::Success).unwrap();
        assert!(step.finished);
        assert!(step.newly_ready.is_empty());
        assert_eq!(
            s.plan().summary().outcome_of("c"),
            Some(&FinalOutcome::Skipped(SkipReason::Cancelled))
        );
    }

    #[test]
    fn empty_plan_is_finished_immediately() {
        let s = scheduler(PlanBuilder::new(), FailurePolicy::FailFast);
        assert_finished(&s);
    }

    #[tokio::test]
    async fn waiting_worker_wakes_when_a_dependency_completes() {
        let s = Arc::new(scheduler(
            PlanBuilder::new()
                .with_node(def("a"))
                .with_node(def("b").after("a")),
            FailurePolicy::Continue,
        ));
        let a = claim(&s);

        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.select_next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        s.report_complete(&a, NodeOutcome::Success).unwrap();
        let b = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter was never woken")
            .unwrap()
            .unwrap()
            .expect("expected a node");
        assert_eq!(b.name(), "b");
    }
}
