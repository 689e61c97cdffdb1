// tests/runtime_fake_backend.rs

use cloudstep_test_utils::builders::resource_chain;
use cloudstep_test_utils::fake_backend::FakeBackend;
use cloudstep_test_utils::init_tracing;

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use cloudstep::dag::{RunState, Scheduler};
use cloudstep::engine::{CoreRuntime, NodeOutcome, Runtime, RuntimeEvent};
use cloudstep::graph::{GraphBuilder, ProvisionGraph, ResourceConfig};

type TestResult = Result<(), Box<dyn Error>>;

/// a -> b -> c, plus d depending on a.
fn diamond_free_graph() -> ProvisionGraph {
    let mut b = GraphBuilder::new();
    let chain = resource_chain(&mut b, &["a", "b", "c"]);
    b.resource("d", "test:Resource", ResourceConfig::new(), [&chain[0]])
        .unwrap();
    b.build().unwrap()
}

#[tokio::test]
async fn runtime_with_fake_backend_runs_graph() -> TestResult {
    init_tracing();

    let graph = diamond_free_graph();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(rt_tx.clone(), dispatched.clone());

    let core = CoreRuntime::new(Scheduler::from_graph(&graph));
    let runtime = Runtime::new(core, rt_rx, backend);

    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert!(report.succeeded());
    let order = dispatched.lock().unwrap().clone();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], "a");
    let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
    assert!(pos("b") < pos("c"));
    Ok(())
}

#[tokio::test]
async fn failure_blocks_downstream_but_not_siblings() -> TestResult {
    init_tracing();

    let graph = diamond_free_graph();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(rt_tx.clone(), dispatched.clone())
        .with_outcome("b", NodeOutcome::Failed("boom".to_string()));

    let core = CoreRuntime::new(Scheduler::from_graph(&graph));
    let report = timeout(Duration::from_secs(3), Runtime::new(core, rt_rx, backend).run()).await??;

    assert_eq!(report.state_of("a"), Some(RunState::Succeeded));
    assert_eq!(report.state_of("b"), Some(RunState::Failed));
    assert_eq!(report.state_of("c"), Some(RunState::Blocked));
    assert_eq!(report.state_of("d"), Some(RunState::Succeeded));
    assert_eq!(report.node("b").unwrap().error.as_deref(), Some("boom"));
    assert!(!dispatched.lock().unwrap().contains(&"c".to_string()));
    Ok(())
}

#[tokio::test]
async fn shutdown_request_stops_the_apply() -> TestResult {
    init_tracing();

    let graph = diamond_free_graph();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(rt_tx.clone(), dispatched.clone());

    // Queued ahead of every completion the backend will report.
    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;

    let core = CoreRuntime::new(Scheduler::from_graph(&graph));
    let report = timeout(Duration::from_secs(3), Runtime::new(core, rt_rx, backend).run()).await??;

    assert!(report.interrupted);
    assert!(!report.succeeded());
    assert_eq!(*dispatched.lock().unwrap(), vec!["a".to_string()]);
    assert_eq!(report.state_of("b"), Some(RunState::Pending));
    Ok(())
}

#[tokio::test]
async fn empty_graph_finishes_immediately() -> TestResult {
    let graph = GraphBuilder::new().build()?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(4);
    let backend = FakeBackend::new(rt_tx, Arc::new(Mutex::new(Vec::new())));

    let core = CoreRuntime::new(Scheduler::from_graph(&graph));
    let report = timeout(Duration::from_secs(1), Runtime::new(core, rt_rx, backend).run()).await??;

    assert!(report.nodes.is_empty());
    assert!(report.succeeded());
    Ok(())
}
