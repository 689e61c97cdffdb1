// src/stack.rs

//! The single-node stack: network, compute instance with attached storage,
//! and the remote steps that bring the n8n service up on it.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tracing::info;

use crate::config::{Settings, StackSection};
use crate::errors::{CloudstepError, Result};
use crate::graph::{
    Credential, GraphBuilder, Input, LookupSpec, OutputRef, OutputStore, ProvisionGraph,
    RemoteStep, ResourceConfig, ResourceOptions, ScriptStep, StepCommand, Target,
};
use crate::script::ScriptLoader;

pub const CLOUD_INIT_SCRIPT: &str = "cloud-init.sh";
pub const VOLUME_MOUNT_SCRIPT: &str = "volume-mount.sh";
pub const DUCKDNS_SCRIPT: &str = "duckdns.sh";
pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const N8N_SCRIPT: &str = "n8n.sh";

const AWAIT_CLOUD_INIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const VOLUME_MOUNT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const N8N_DEPLOY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DUCKDNS_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// References to the values reported after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    pub public_ip: OutputRef,
    pub instance_id: OutputRef,
    pub instance_name: OutputRef,
}

impl StackOutputs {
    /// Resolve every output; fails if the instance never published them.
    pub fn resolve(&self, outputs: &OutputStore) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();
        for (key, r) in [
            ("public_ip", &self.public_ip),
            ("instance_id", &self.instance_id),
            ("instance_name", &self.instance_name),
        ] {
            let value = r
                .resolve(outputs)
                .map_err(|e| CloudstepError::ApplyFailed(e.to_string()))?;
            resolved.insert(key.to_string(), value.to_string());
        }
        Ok(resolved)
    }
}

#[derive(Debug, Clone)]
pub struct Stack {
    pub graph: ProvisionGraph,
    pub outputs: StackOutputs,
}

/// Load the payloads and declare every node of the stack.
pub fn declare_stack(stack: &StackSection, settings: &Settings, loader: &ScriptLoader) -> Result<Stack> {
    let vars = settings.script_variables();

    let cloud_init = loader.load(CLOUD_INIT_SCRIPT, &vars)?;
    let volume_mount = loader.load(VOLUME_MOUNT_SCRIPT, &vars)?;
    let duckdns = loader.load(DUCKDNS_SCRIPT, &vars)?;
    let compose = loader.load(COMPOSE_FILE, &vars)?;

    // The compose file is embedded into the deployment script as one more variable.
    let mut n8n_vars = vars.clone();
    n8n_vars.push(("DOCKER_COMPOSE_CONTENT".to_string(), compose.text().to_string()));
    let n8n = loader.load(N8N_SCRIPT, &n8n_vars)?;

    let p = &stack.name_prefix;
    let mut b = GraphBuilder::new();
    let none: [&str; 0] = [];

    let compartment = b.resource(
        &format!("{p}-cloud"),
        "oci:identity/Compartment",
        ResourceConfig::new()
            .with("name", format!("{p}-cloud"))
            .with("description", stack.compartment_description.as_str())
            .with("enableDelete", true),
        none,
    )?;
    let compartment_id = compartment.id_output();

    let vcn = b.resource(
        &format!("{p}-vcn"),
        "oci:core/Vcn",
        ResourceConfig::new()
            .with("cidrBlock", stack.vcn_cidr.as_str())
            .with("compartmentId", compartment_id.clone())
            .with("displayName", display_name(p, "VCN")),
        [&compartment],
    )?;

    let igw = b.resource(
        &format!("{p}-igw"),
        "oci:core/InternetGateway",
        ResourceConfig::new()
            .with("compartmentId", compartment_id.clone())
            .with("vcnId", vcn.id_output())
            .with("displayName", display_name(p, "IGW"))
            .with("enabled", true),
        [&vcn],
    )?;

    let route_table = b.resource(
        &format!("{p}-rt"),
        "oci:core/RouteTable",
        ResourceConfig::new()
            .with("compartmentId", compartment_id.clone())
            .with("vcnId", vcn.id_output())
            .with("displayName", display_name(p, "RT"))
            .with(
                "routeRules",
                vec![Input::map([
                    ("destination", Input::from("0.0.0.0/0")),
                    ("destinationType", Input::from("CIDR_BLOCK")),
                    ("networkEntityId", Input::from(igw.id_output())),
                ])],
            ),
        [&vcn, &igw],
    )?;

    let security_list = b.resource(
        &format!("{p}-security-list"),
        "oci:core/SecurityList",
        ResourceConfig::new()
            .with("compartmentId", compartment_id.clone())
            .with("vcnId", vcn.id_output())
            .with("displayName", display_name(p, "Security List"))
            .with(
                "ingressSecurityRules",
                json!([
                    tcp_ingress("SSH", 22),
                    tcp_ingress("Expose n8n UI", settings.n8n_port),
                ]),
            )
            .with(
                "egressSecurityRules",
                json!([{
                    "protocol": "all",
                    "destination": "0.0.0.0/0",
                    "destinationType": "CIDR_BLOCK",
                }]),
            ),
        [&vcn],
    )?;

    let subnet = b.resource(
        &format!("{p}-subnet"),
        "oci:core/Subnet",
        ResourceConfig::new()
            .with("cidrBlock", stack.subnet_cidr.as_str())
            .with("compartmentId", compartment_id.clone())
            .with("vcnId", vcn.id_output())
            .with("displayName", display_name(p, "Subnet"))
            .with("prohibitPublicIpOnVnic", false)
            .with("routeTableId", route_table.id_output())
            .with("securityListIds", vec![Input::from(security_list.id_output())]),
        [&vcn, &route_table, &security_list],
    )?;

    let availability_domain = b.lookup(
        "availability-domain",
        LookupSpec::new(compartment_id.clone(), stack.availability_domain_pattern.as_str()),
        [&compartment],
    )?;

    let volume = b.resource(
        &format!("{p}-volume"),
        "oci:core/Volume",
        ResourceConfig::new()
            .with("compartmentId", compartment_id.clone())
            .with("availabilityDomain", availability_domain.output("name"))
            .with("sizeInGbs", stack.volume_size_gbs.to_string())
            .with("displayName", display_name(p, "Volume")),
        [&availability_domain],
    )?;

    let instance = b.resource_with_options(
        &format!("{p}-instance"),
        "oci:core/Instance",
        ResourceConfig::new()
            .with("compartmentId", compartment_id.clone())
            .with("availabilityDomain", availability_domain.output("name"))
            .with("shape", stack.shape.as_str())
            .with(
                "shapeConfig",
                json!({ "ocpus": stack.ocpus, "memoryInGbs": stack.memory_gbs }),
            )
            .with("displayName", display_name(p, "Instance"))
            .with(
                "createVnicDetails",
                Input::map([("subnetId", Input::from(subnet.id_output()))]),
            )
            .with(
                "sourceDetails",
                json!({ "sourceType": "image", "sourceId": stack.image_id }),
            )
            .with(
                "metadata",
                json!({
                    "ssh_authorized_keys": settings.ssh_public_key,
                    "user_data": BASE64.encode(cloud_init.text()),
                }),
            ),
        ResourceOptions {
            delete_before_replace: true,
        },
        [&subnet, &availability_domain],
    )?;

    let attachment = b.resource_with_options(
        &format!("{p}-volume-attachment"),
        "oci:core/VolumeAttachment",
        ResourceConfig::new()
            .with("instanceId", instance.id_output())
            .with("volumeId", volume.id_output())
            .with("attachmentType", "paravirtualized")
            .with("device", settings.volume_device.as_str()),
        ResourceOptions {
            delete_before_replace: true,
        },
        [&instance, &volume],
    )?;

    let target = Target::new(
        instance.output("public_ip"),
        stack.ssh_user.as_str(),
        Credential::KeyFile(settings.ssh_private_key_path.clone()),
    );

    // Readiness signal: the instance finished its first boot.
    let await_cloud_init = b.step(
        RemoteStep::new(
            "await-cloud-init",
            target.clone(),
            StepCommand::shell("sudo cloud-init status --wait"),
        )
        .trigger(instance.id_output())
        .timeout(AWAIT_CLOUD_INIT_TIMEOUT)
        .retry_connection(true),
        [&instance],
    )?;

    let volume_mount_step = b.script_step(
        ScriptStep::new("volume-mount", target.clone(), volume_mount)
            .trigger(instance.id_output())
            .trigger(attachment.id_output())
            .timeout(VOLUME_MOUNT_TIMEOUT)
            .retry_connection(true),
        [&attachment],
    )?;

    b.script_step(
        ScriptStep::new("n8n-deployment", target.clone(), n8n)
            .trigger(instance.id_output())
            .trigger(compose.text())
            .timeout(N8N_DEPLOY_TIMEOUT),
        [&await_cloud_init, &volume_mount_step],
    )?;

    // Independent of the service branch; only needs the instance address.
    b.script_step(
        ScriptStep::new("duckdns-setup", target, duckdns)
            .trigger(instance.id_output())
            .trigger(settings.duck_dns_token.as_str())
            .timeout(DUCKDNS_TIMEOUT)
            .retry_connection(true),
        [&instance],
    )?;

    let graph = b.build()?;
    info!(nodes = graph.len(), "declared stack");

    Ok(Stack {
        graph,
        outputs: StackOutputs {
            public_ip: instance.output("public_ip"),
            instance_id: instance.id_output(),
            instance_name: instance.output("display_name"),
        },
    })
}

fn display_name(prefix: &str, what: &str) -> String {
    let mut chars = prefix.chars();
    let title: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{title} {what}")
}

fn tcp_ingress(description: &str, port: u16) -> serde_json::Value {
    json!({
        "description": description,
        "protocol": "6",
        "source": "0.0.0.0/0",
        "sourceType": "CIDR_BLOCK",
        "tcpOptions": { "min": port, "max": port },
    })
}
