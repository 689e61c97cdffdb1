// tests/apply_stack.rs

mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use cloudstep::dag::RunState;
use cloudstep::trigger::TriggerEvaluator;
use cloudstep_test_utils::builders::ConfigFileBuilder;
use cloudstep_test_utils::fake_connector::FakeConnector;
use cloudstep_test_utils::fake_provider::{FakeProvider, FAKE_PUBLIC_IP};
use cloudstep_test_utils::{init_tracing, with_timeout};

use common::{apply_with, assert_dependency_order, fixture_stack};

fn position(created: &[String], id: &str) -> usize {
    created
        .iter()
        .position(|c| c == id)
        .unwrap_or_else(|| panic!("{id} was never created"))
}

#[tokio::test]
async fn full_stack_applies_in_dependency_order() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let provider = FakeProvider::new();
    let connector = FakeConnector::new();
    let evaluator = TriggerEvaluator::in_memory();

    let (report, outputs) =
        with_timeout(apply_with(&stack.graph, &provider, &connector, &evaluator, 4)).await;

    assert!(report.succeeded(), "report:\n{report}");
    assert_eq!(report.count(RunState::Succeeded), stack.graph.len());
    assert_dependency_order(&stack.graph, &report);

    let created = provider.created();
    assert!(position(&created, "angel-cloud") < position(&created, "angel-vcn"));
    assert!(position(&created, "angel-vcn") < position(&created, "angel-igw"));
    assert!(position(&created, "angel-igw") < position(&created, "angel-rt"));
    assert!(position(&created, "angel-rt") < position(&created, "angel-subnet"));
    assert!(position(&created, "angel-security-list") < position(&created, "angel-subnet"));
    assert!(position(&created, "angel-subnet") < position(&created, "angel-instance"));
    assert!(position(&created, "angel-instance") < position(&created, "angel-volume-attachment"));
    assert!(position(&created, "angel-volume") < position(&created, "angel-volume-attachment"));

    let resolved = stack.outputs.resolve(&outputs.read().unwrap()).unwrap();
    assert_eq!(resolved["public_ip"], FAKE_PUBLIC_IP);
    assert_eq!(resolved["instance_id"], "ocid1.test.angel-instance");
    assert_eq!(resolved["instance_name"], "Angel Instance");

    for destination in connector.destinations() {
        assert_eq!(destination, format!("opc@{FAKE_PUBLIC_IP}"));
    }
    assert_eq!(connector.runs_matching("cloud-init status --wait"), 1);
    assert_eq!(connector.runs_matching("sudo bash /tmp/n8n-deployment.sh"), 1);
}

#[tokio::test]
async fn resource_configuration_carries_upstream_identities() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new().setting("N8N_PORT", "8080"));
    let provider = FakeProvider::new();
    let (report, _) = with_timeout(apply_with(
        &stack.graph,
        &provider,
        &FakeConnector::new(),
        &TriggerEvaluator::in_memory(),
        2,
    ))
    .await;
    assert!(report.succeeded(), "report:\n{report}");

    let subnet = provider.request("angel-subnet").unwrap();
    assert_eq!(subnet.config["vcnId"], "ocid1.test.angel-vcn");
    assert_eq!(subnet.config["routeTableId"], "ocid1.test.angel-rt");
    assert_eq!(subnet.config["securityListIds"][0], "ocid1.test.angel-security-list");

    let volume = provider.request("angel-volume").unwrap();
    assert_eq!(volume.config["availabilityDomain"], "Uocm:US-CHICAGO-1-AD-1");

    let rules = provider.request("angel-security-list").unwrap();
    assert_eq!(rules.config["ingressSecurityRules"][1]["tcpOptions"]["min"], 8080);

    let instance = provider.request("angel-instance").unwrap();
    assert!(instance.delete_before_replace);
    let user_data = instance.config["metadata"]["user_data"].as_str().unwrap();
    let cloud_init = String::from_utf8(BASE64.decode(user_data).unwrap()).unwrap();
    assert!(cloud_init.contains("--add-port=8080/tcp"), "{cloud_init}");

    let attachment = provider.request("angel-volume-attachment").unwrap();
    assert_eq!(attachment.config["device"], "/dev/oracleoci/oraclevdb");
    assert_eq!(attachment.config["instanceId"], "ocid1.test.angel-instance");
}

#[tokio::test]
async fn concurrency_never_exceeds_max_parallel() {
    use std::time::Duration;

    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let provider = FakeProvider::new().with_latency(Duration::from_millis(20));

    let (report, _) = with_timeout(apply_with(
        &stack.graph,
        &provider,
        &FakeConnector::new(),
        &TriggerEvaluator::in_memory(),
        1,
    ))
    .await;

    assert!(report.succeeded(), "report:\n{report}");
    assert_eq!(provider.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn independent_resources_are_created_concurrently() {
    use std::time::Duration;

    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let provider = FakeProvider::new().with_latency(Duration::from_millis(20));

    let (report, _) = apply_with(
        &stack.graph,
        &provider,
        &FakeConnector::new(),
        &TriggerEvaluator::in_memory(),
        3,
    )
    .await;

    assert!(report.succeeded(), "report:\n{report}");
    // angel-igw and angel-security-list both wait only on angel-vcn.
    assert!(provider.max_in_flight() >= 2, "max in flight: {}", provider.max_in_flight());
    assert!(provider.max_in_flight() <= 3);

    let igw = report.node("angel-igw").unwrap();
    let security_list = report.node("angel-security-list").unwrap();
    assert!(igw.started_at.unwrap() < security_list.completed_at.unwrap());
    assert!(security_list.started_at.unwrap() < igw.completed_at.unwrap());
}

#[tokio::test]
async fn lookup_without_a_matching_candidate_fails() {
    init_tracing();

    let stack = fixture_stack(ConfigFileBuilder::new());
    let provider = FakeProvider::new().with_candidates(&["Uocm:US-ASHBURN-1-AD-1"]);

    let (report, _) = with_timeout(apply_with(
        &stack.graph,
        &provider,
        &FakeConnector::new(),
        &TriggerEvaluator::in_memory(),
        4,
    ))
    .await;

    let lookup = report.node("availability-domain").unwrap();
    assert_eq!(lookup.state, RunState::Failed);
    assert!(lookup.error.as_deref().unwrap().contains("no availability candidate"));
    assert_eq!(report.state_of("angel-instance"), Some(RunState::Blocked));
    assert_eq!(report.state_of("angel-volume"), Some(RunState::Blocked));
    // The network does not depend on the lookup.
    assert_eq!(report.state_of("angel-subnet"), Some(RunState::Succeeded));
}
