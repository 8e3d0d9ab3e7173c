use aegis::domain::errors::PlanError;
use aegis::domain::models::{RiskLevel, SessionState, ToolInput, ToolKind};
use aegis::services::{
    detect_cycle, topological_order, Executor, ExecutorConfig, PlanValidator, TaskDescriptor,
    ToolRegistry,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

mod common;

fn registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new().with_backend(common::CountingBackend::ok(ToolKind::FileRead)))
}

fn task_id(index: usize) -> String {
    format!("t{index}")
}

/// Descriptors for `deps`, where `deps[i]` lists the indices task `i`
/// depends on, emitted in the order given by `listing`.
fn descriptors(deps: &[Vec<usize>], listing: &[usize]) -> Vec<TaskDescriptor> {
    listing
        .iter()
        .map(|&i| {
            let mut input = ToolInput::new();
            input.insert("path".to_string(), format!("file_{i}.txt").into());
            TaskDescriptor {
                id: task_id(i),
                description: format!("Read file {i}"),
                tool: "file_read".to_string(),
                tool_input: input,
                dependencies: deps[i].iter().map(|&d| task_id(d)).collect(),
                risk_level: RiskLevel::Low,
            }
        })
        .collect()
}

/// Random DAG: task `i` only depends on lower indices. Paired with a random
/// listing order so the plan is rarely given in dependency order.
fn dag() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..24).prop_flat_map(|size| {
        let deps: Vec<_> = (0..size)
            .map(|i| prop::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect();
        let listing = Just((0..size).collect::<Vec<_>>()).prop_shuffle();
        (deps, listing)
    })
}

/// A chain `t0 <- t1 <- ... <- tN` closed into a cycle by `t0` depending on
/// the last task, plus random extra back-edges.
fn cyclic() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (2usize..16).prop_flat_map(|size| {
        let extra: Vec<_> = (0..size)
            .map(|i| prop::collection::vec(0..i.max(1), 0..=i.min(2)))
            .collect();
        let listing = Just((0..size).collect::<Vec<_>>()).prop_shuffle();
        (extra, listing).prop_map(move |(mut deps, listing)| {
            for (i, list) in deps.iter_mut().enumerate() {
                if i > 0 {
                    list.push(i - 1);
                }
            }
            deps[0].push(size - 1);
            (deps, listing)
        })
    })
}

proptest! {
    /// Property: an acyclic plan validates whatever order it is listed in,
    /// and the derived order puts every dependency before its dependent.
    #[test]
    fn prop_acyclic_plans_order_dependencies_first((deps, listing) in dag()) {
        let plan = PlanValidator::new(registry())
            .validate(descriptors(&deps, &listing))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let order = topological_order(&plan);
        prop_assert_eq!(order.len(), deps.len());

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.as_str(), pos))
            .collect();
        for (i, task_deps) in deps.iter().enumerate() {
            let id = task_id(i);
            for &d in task_deps {
                let dep = task_id(d);
                prop_assert!(
                    position[dep.as_str()] < position[id.as_str()],
                    "{} must come before {}", dep, id
                );
            }
        }
    }

    /// Property: a cyclic plan is rejected and the reported path is a real
    /// cycle through the dependency graph.
    #[test]
    fn prop_cycles_are_rejected_with_path((deps, listing) in cyclic()) {
        let err = PlanValidator::new(registry())
            .validate(descriptors(&deps, &listing))
            .expect_err("cycle must be rejected");

        let PlanError::DependencyCycle(path) = &err else {
            return Err(TestCaseError::fail(format!("unexpected error: {err}")));
        };
        prop_assert!(path.len() >= 2);
        prop_assert_eq!(path.first(), path.last());
        prop_assert_eq!(err.offending_task(), path.first().map(String::as_str));

        let edges: HashMap<String, HashSet<String>> = deps
            .iter()
            .enumerate()
            .map(|(i, list)| (task_id(i), list.iter().map(|&d| task_id(d)).collect()))
            .collect();
        for pair in path.windows(2) {
            prop_assert!(
                edges[&pair[0]].contains(&pair[1]),
                "{} does not depend on {}", pair[0], pair[1]
            );
        }
    }

    /// Property: cycle detection agrees with validation on acyclic input.
    #[test]
    fn prop_detect_cycle_none_for_dag((deps, _listing) in dag()) {
        let nodes: Vec<(String, Vec<String>)> = deps
            .iter()
            .enumerate()
            .map(|(i, list)| (task_id(i), list.iter().map(|&d| task_id(d)).collect()))
            .collect();
        let found = detect_cycle(nodes.iter().map(|(id, d)| (id.as_str(), d.as_slice())));
        prop_assert!(found.is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: executing an acyclic plan completes every task, each one
    /// after all of its dependencies.
    #[test]
    fn prop_execution_respects_dependencies((deps, listing) in dag()) {
        let registry = registry();
        let plan = PlanValidator::new(registry.clone())
            .validate(descriptors(&deps, &listing))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut session = SessionState::new("prop", u32::MAX);
        session.adopt_plan(plan);
        let executor = Executor::new(
            registry,
            ExecutorConfig { max_retries: 1, retry_delay: Duration::ZERO },
        );

        let summary = tokio_test::block_on(executor.run(&mut session));

        prop_assert_eq!(summary.completed, deps.len());
        prop_assert_eq!(summary.remaining, 0);

        let finished: Vec<String> = session.plan.completed().map(|t| t.id.clone()).collect();
        let position: HashMap<&str, usize> = finished
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.as_str(), pos))
            .collect();
        for (i, task_deps) in deps.iter().enumerate() {
            let id = task_id(i);
            for &d in task_deps {
                let dep = task_id(d);
                prop_assert!(position[dep.as_str()] < position[id.as_str()]);
            }
        }
    }
}
