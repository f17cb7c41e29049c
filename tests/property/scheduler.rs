use std::collections::HashSet;

use proptest::prelude::*;

use execplan::config::ConfigFile;
use execplan::dag::{ExecutionPlan, NodeOutcome, NodeState, Scheduler, Selection};
use execplan::types::{FailurePolicy, SchedulingOrder};
use execplan_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("task_{i}");
                let mut task_builder = TaskConfigBuilder::new(&format!("echo {name}"));

                let mut valid_deps = HashSet::new();
                for dep_idx in potential_deps {
                    if i > 0 {
                        valid_deps.insert(dep_idx % i);
                    }
                }

                for dep_idx in valid_deps {
                    task_builder = task_builder.after(&format!("task_{dep_idx}"));
                }
                builder = builder.with_task(&name, task_builder.build());
            }
            builder.build()
        })
    })
}

fn policy_strategy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![Just(FailurePolicy::FailFast), Just(FailurePolicy::Continue)]
}

fn order_strategy() -> impl Strategy<Value = SchedulingOrder> {
    prop_oneof![Just(SchedulingOrder::Declaration), Just(SchedulingOrder::MostDependents)]
}

proptest! {
    #[test]
    fn scheduler_respects_dependencies_and_terminates(
        cfg in dag_config_strategy(9),
        policy in policy_strategy(),
        order in order_strategy(),
        failing in proptest::collection::hash_set(0..9usize, 0..4),
        // Which in-flight node completes next, as indices into the in-flight list.
        picks in proptest::collection::vec(any::<usize>(), 1..32),
    ) {
        let plan = ExecutionPlan::from_config(&cfg).unwrap();
        let scheduler = Scheduler::new(plan, policy, order);
        let plan = scheduler.shared_plan();

        let failing: HashSet<String> = failing.iter().map(|i| format!("task_{i}")).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut executing = Vec::new();
        let mut step = 0usize;

        loop {
            while let Selection::Claimed(node) = scheduler.try_select_next().unwrap() {
                // Readiness: every predecessor already succeeded.
                for dep in node.dependencies() {
                    prop_assert_eq!(
                        dep.state(),
                        NodeState::Succeeded,
                        "{} claimed before dependency {} succeeded",
                        node.name(),
                        dep.name()
                    );
                }
                prop_assert!(claimed.insert(node.name().to_string()), "{} claimed twice", node.name());
                executing.push(node);
            }

            if executing.is_empty() {
                break;
            }

            let idx = picks[step % picks.len()] % executing.len();
            step += 1;
            let node = executing.remove(idx);
            let outcome = if failing.contains(node.name()) {
                NodeOutcome::Failed("planned failure".into())
            } else {
                NodeOutcome::Success
            };
            scheduler.report_complete(&node, outcome).unwrap();
        }

        // Termination: every node is terminal and nothing is left to claim.
        prop_assert!(plan.is_finished(), "{} nodes left non-terminal", plan.remaining());
        prop_assert!(matches!(scheduler.try_select_next().unwrap(), Selection::Finished));

        for node in plan.nodes() {
            match node.state() {
                NodeState::Succeeded | NodeState::Failed => {
                    prop_assert!(claimed.contains(node.name()));
                }
                NodeState::Skipped => {
                    prop_assert!(!claimed.contains(node.name()));
                    if policy == FailurePolicy::Continue {
                        // Skips under continue are only ever caused by a
                        // predecessor that did not succeed.
                        prop_assert!(node.dependencies().iter().any(|d| !d.is_successful()));
                    }
                }
                other => prop_assert!(false, "{} ended in {:?}", node.name(), other),
            }
        }

        prop_assert_eq!(plan.failed_count(), plan.nodes().iter().filter(|n| n.state() == NodeState::Failed).count());
        prop_assert_eq!(plan.skipped_count(), plan.nodes().iter().filter(|n| n.state() == NodeState::Skipped).count());
    }
}
