// tests/partial_failure.rs

mod common;

use std::time::Duration;

use cloudstep::dag::RunState;
use cloudstep::trigger::TriggerEvaluator;
use cloudstep_test_utils::builders::ConfigFileBuilder;
use cloudstep_test_utils::fake_connector::FakeConnector;
use cloudstep_test_utils::fake_provider::{FakeProvider, FAKE_PUBLIC_IP};
use cloudstep_test_utils::{init_tracing, with_timeout};

use common::{apply_with, assert_dependency_order, fixture_stack};

#[tokio::test]
async fn failed_resource_blocks_only_its_dependents() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let provider = FakeProvider::new().fail_on("angel-volume");
    let connector = FakeConnector::new();

    let (report, _) = with_timeout(apply_with(
        &stack.graph,
        &provider,
        &connector,
        &TriggerEvaluator::in_memory(),
        4,
    ))
    .await;

    assert!(!report.succeeded());
    let volume = report.node("angel-volume").unwrap();
    assert_eq!(volume.state, RunState::Failed);
    assert!(volume.error.as_deref().unwrap().contains("rejected by fake provider"));

    for blocked in [
        "angel-volume-attachment",
        "volume-mount-deliver",
        "volume-mount",
        "n8n-deployment-deliver",
        "n8n-deployment",
    ] {
        let node = report.node(blocked).unwrap();
        assert_eq!(node.state, RunState::Blocked, "{blocked}");
        assert!(node.started_at.is_none(), "{blocked} must never start");
    }

    // Branches that do not need the volume still complete.
    for ok in ["angel-instance", "await-cloud-init", "duckdns-setup-deliver", "duckdns-setup"] {
        assert_eq!(report.state_of(ok), Some(RunState::Succeeded), "{ok}");
    }
    assert!(!provider.created().contains(&"angel-volume-attachment".to_string()));
    assert_eq!(connector.runs_matching("volume-mount"), 0);
    assert_dependency_order(&stack.graph, &report);

    assert_eq!(report.failures().len(), 1);
    let summary = report.to_string();
    assert!(summary.contains("1 failed"), "{summary}");
    assert!(summary.contains("5 blocked"), "{summary}");
}

#[tokio::test]
async fn non_zero_exit_reports_the_output_tail() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let connector = FakeConnector::new().fail_when(
        "sudo bash /tmp/volume-mount.sh",
        32,
        "mounting /dev/oracleoci/oraclevdb\nmount: wrong fs type, bad option\n",
    );

    let (report, _) = with_timeout(apply_with(
        &stack.graph,
        &FakeProvider::new(),
        &connector,
        &TriggerEvaluator::in_memory(),
        4,
    ))
    .await;

    let step = report.node("volume-mount").unwrap();
    assert_eq!(step.state, RunState::Failed);
    let error = step.error.as_deref().unwrap();
    assert!(error.contains("exited with code 32"), "{error}");
    assert!(error.contains("wrong fs type"), "{error}");

    assert_eq!(report.state_of("volume-mount-deliver"), Some(RunState::Succeeded));
    assert_eq!(report.state_of("n8n-deployment-deliver"), Some(RunState::Blocked));
    assert_eq!(report.state_of("n8n-deployment"), Some(RunState::Blocked));
    assert_eq!(report.state_of("duckdns-setup"), Some(RunState::Succeeded));
}

#[tokio::test(start_paused = true)]
async fn unreachable_host_times_out_every_first_step() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let connector = FakeConnector::new().unreachable(FAKE_PUBLIC_IP);

    let (report, _) = apply_with(
        &stack.graph,
        &FakeProvider::new(),
        &connector,
        &TriggerEvaluator::in_memory(),
        4,
    )
    .await;

    // First-contact steps keep redialling until their own timeout.
    for first in ["await-cloud-init", "volume-mount-deliver", "duckdns-setup-deliver"] {
        let node = report.node(first).unwrap();
        assert_eq!(node.state, RunState::TimedOut, "{first}");
        assert!(node.error.as_deref().unwrap().contains("exceeded its timeout"), "{first}");
    }
    assert!(report.node("duckdns-setup-deliver").unwrap().elapsed().unwrap() >= Duration::from_secs(2 * 60));
    assert_eq!(report.count(RunState::Blocked), 4);
    assert!(connector.connects() > 3);
    assert!(connector.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn host_that_refuses_while_booting_is_retried() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let connector = FakeConnector::new().refuse_first(3);

    let (report, _) = apply_with(
        &stack.graph,
        &FakeProvider::new(),
        &connector,
        &TriggerEvaluator::in_memory(),
        4,
    )
    .await;

    assert!(report.succeeded(), "report:\n{report}");
    // Seven remote commands, three refused dials ahead of them.
    assert_eq!(connector.commands().len(), 7);
    assert_eq!(connector.connects(), 10);
    assert_dependency_order(&stack.graph, &report);
}
