// tests/scheduler_properties.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use tokio::time::Instant;

use cloudstep::dag::{RunState, Scheduler};
use cloudstep::engine::NodeOutcome;
use cloudstep::graph::{GraphBuilder, ProvisionGraph, ResourceConfig};

// Strategy to generate a valid acyclic graph: node N may only depend on
// nodes 0..N-1.
fn graph_strategy(max_nodes: usize) -> impl Strategy<Value = ProvisionGraph> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_nodes),
            num_nodes,
        )
        .prop_map(move |raw_deps| {
            let mut builder = GraphBuilder::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let deps: HashSet<String> = if i == 0 {
                    HashSet::new()
                } else {
                    potential.into_iter().map(|d| format!("n{}", d % i)).collect()
                };
                builder
                    .resource(&format!("n{i}"), "test:Resource", ResourceConfig::new(), deps)
                    .unwrap();
            }
            builder.build().unwrap()
        })
    })
}

/// Transitive dependencies of `id`.
fn ancestors(graph: &ProvisionGraph, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack: Vec<String> = graph.dependencies_of(id).to_vec();
    while let Some(dep) = stack.pop() {
        if seen.insert(dep.clone()) {
            stack.extend(graph.dependencies_of(&dep).iter().cloned());
        }
    }
    seen
}

proptest! {
    #[test]
    fn apply_terminates_with_consistent_states(
        graph in graph_strategy(12),
        failing_indices in proptest::collection::vec(0..12usize, 0..4),
        completion_picks in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let failing: HashSet<String> = failing_indices.iter().map(|i| format!("n{i}")).collect();
        let mut scheduler = Scheduler::from_graph(&graph);
        let now = Instant::now();

        let mut in_flight: Vec<String> = scheduler
            .start_apply()
            .newly_ready
            .into_iter()
            .map(|n| n.id)
            .collect();
        let mut started: HashMap<String, usize> = HashMap::new();
        let mut tick = 0usize;

        // Complete in-flight nodes in an arbitrary order.
        while !in_flight.is_empty() {
            prop_assert!(tick < 1000, "apply did not terminate");
            let pick = completion_picks[tick % completion_picks.len()] % in_flight.len();
            let id = in_flight.swap_remove(pick);

            for dep in graph.dependencies_of(&id) {
                prop_assert_eq!(scheduler.run_state_of(dep), Some(RunState::Succeeded));
            }
            scheduler.handle_started(&id, now);
            started.insert(id.clone(), tick);

            let outcome = if failing.contains(&id) {
                NodeOutcome::Failed("injected".to_string())
            } else {
                NodeOutcome::Succeeded { executed: true }
            };
            let step = scheduler.handle_completion(&id, outcome, now);
            in_flight.extend(step.newly_ready.into_iter().map(|n| n.id));
            tick += 1;
        }

        prop_assert!(scheduler.is_finished());
        for id in graph.node_ids() {
            let state = scheduler.run_state_of(id).unwrap();
            let upstream_failed = ancestors(&graph, id).iter().any(|a| failing.contains(a));
            if upstream_failed {
                prop_assert_eq!(state, RunState::Blocked, "{} should be blocked", id);
                prop_assert!(!started.contains_key(id));
            } else if failing.contains(id) {
                prop_assert_eq!(state, RunState::Failed);
            } else {
                prop_assert_eq!(state, RunState::Succeeded);
            }
        }
    }
}
