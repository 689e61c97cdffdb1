#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use cloudstep::dag::Scheduler;
use cloudstep::engine::{ApplyReport, CoreRuntime, Runtime, RuntimeEvent};
use cloudstep::exec::{ProvisionBackend, StepExecutor};
use cloudstep::graph::{OutputStore, ProvisionGraph};
use cloudstep::stack::{declare_stack, Stack};
use cloudstep::trigger::TriggerEvaluator;
use cloudstep::types::PlaceholderPolicy;
use cloudstep_test_utils::builders::{fixture_loader, ConfigFileBuilder};
use cloudstep_test_utils::fake_connector::FakeConnector;
use cloudstep_test_utils::fake_provider::FakeProvider;
use tokio::sync::mpsc;

/// Apply `graph` through the production backend wired to fakes.
pub async fn apply_with(
    graph: &ProvisionGraph,
    provider: &FakeProvider,
    connector: &FakeConnector,
    evaluator: &TriggerEvaluator,
    max_parallel: usize,
) -> (ApplyReport, Arc<RwLock<OutputStore>>) {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = ProvisionBackend::new(
        Arc::new(provider.clone()),
        StepExecutor::new(Arc::new(connector.clone())),
        evaluator.clone(),
        max_parallel,
        rt_tx,
    );
    let outputs = backend.outputs();

    let core = CoreRuntime::new(Scheduler::from_graph(graph));
    let report = Runtime::new(core, rt_rx, backend)
        .run()
        .await
        .expect("runtime failed");
    (report, outputs)
}

/// The full stack declared from the in-memory payloads.
pub fn fixture_stack(builder: ConfigFileBuilder) -> Stack {
    let cfg = builder.build();
    declare_stack(&cfg.stack, &cfg.settings, &fixture_loader(PlaceholderPolicy::Deny))
        .expect("stack declaration failed")
}

/// Every node started only after all of its dependencies completed.
pub fn assert_dependency_order(graph: &ProvisionGraph, report: &ApplyReport) {
    for node in &report.nodes {
        let Some(started) = node.started_at else {
            continue;
        };
        for dep in graph.dependencies_of(&node.id) {
            let dep_report = report.node(dep).expect("dependency in report");
            let completed = dep_report
                .completed_at
                .unwrap_or_else(|| panic!("{} started before {} completed", node.id, dep));
            assert!(
                completed <= started,
                "{} started before its dependency {} completed",
                node.id,
                dep
            );
        }
    }
}
