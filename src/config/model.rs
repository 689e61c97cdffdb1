// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{FingerprintStorage, PlaceholderPolicy};

/// Settings every apply needs; absence of any of them is fatal.
pub const REQUIRED_SETTINGS: [&str; 6] = [
    "DUCK_DNS_TOKEN",
    "DUCK_DNS_DOMAIN",
    "N8N_PORT",
    "N8N_WEBHOOK_URL",
    "SSH_PUBLIC_KEY",
    "SSH_PRIVATE_KEY_PATH",
];

/// Settings with a fixed default.
pub const DEFAULTED_SETTINGS: [(&str, &str); 2] = [
    ("VOLUME_MOUNT_POINT", "/opt/n8n-data"),
    ("VOLUME_DEVICE", "/dev/oracleoci/oraclevdb"),
];

/// Configuration as read from `Cloudstep.toml`, before validation.
///
/// ```toml
/// [settings]
/// DUCK_DNS_DOMAIN = "my-n8n"
/// N8N_PORT = "5678"
///
/// [engine]
/// max_parallel = 4
/// state_dir = ".cloudstep"
/// fingerprint_storage = "file"
/// placeholder_policy = "warn"
/// provider_command = "cloudstep-oci-helper"
/// ssh_connect_timeout = "30s"
///
/// [stack]
/// availability_domain_pattern = "US-CHICAGO-1-AD-1"
/// ```
///
/// Every section is optional. Environment variables override `[settings]`
/// (see [`crate::config::loader`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Named string values, keyed by their upper-case name.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub stack: StackSection,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Upper bound on nodes executing at the same time.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Directory holding persisted fingerprints.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub fingerprint_storage: FingerprintStorage,

    #[serde(default)]
    pub placeholder_policy: PlaceholderPolicy,

    /// Helper program implementing the provider protocol.
    #[serde(default = "default_provider_command")]
    pub provider_command: String,

    /// Duration string, e.g. `"30s"`.
    #[serde(default = "default_ssh_connect_timeout")]
    pub ssh_connect_timeout: String,
}

fn default_max_parallel() -> usize {
    4
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".cloudstep")
}

fn default_provider_command() -> String {
    "cloudstep-provider".to_string()
}

fn default_ssh_connect_timeout() -> String {
    "30s".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            state_dir: default_state_dir(),
            fingerprint_storage: FingerprintStorage::default(),
            placeholder_policy: PlaceholderPolicy::default(),
            provider_command: default_provider_command(),
            ssh_connect_timeout: default_ssh_connect_timeout(),
        }
    }
}

/// `[stack]` section: the knobs of the single-node stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackSection {
    pub name_prefix: String,
    pub compartment_description: String,
    pub vcn_cidr: String,
    pub subnet_cidr: String,
    pub image_id: String,
    /// Regular expression selecting the availability domain.
    pub availability_domain_pattern: String,
    pub shape: String,
    pub ocpus: u32,
    pub memory_gbs: u32,
    pub volume_size_gbs: u32,
    pub ssh_user: String,
    /// Directory the script payloads are read from.
    pub scripts_dir: PathBuf,
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            name_prefix: "angel".to_string(),
            compartment_description: "Angel's Cloud".to_string(),
            vcn_cidr: "10.0.0.0/16".to_string(),
            subnet_cidr: "10.0.1.0/24".to_string(),
            // Oracle-Linux-9.6-2025.07.21-0
            image_id: "ocid1.image.oc1.us-chicago-1.aaaaaaaa276g7fp3we3wuf2pdumz7c5eiho6iwbg6daiijgqp7u2jt77nkja"
                .to_string(),
            availability_domain_pattern: "US-CHICAGO-1-AD-1".to_string(),
            shape: "VM.Standard.E5.Flex".to_string(),
            ocpus: 1,
            memory_gbs: 8,
            volume_size_gbs: 100,
            ssh_user: "opc".to_string(),
            scripts_dir: PathBuf::from("init"),
        }
    }
}

/// Validated named values. Built once at startup via `TryFrom<RawConfigFile>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub duck_dns_token: String,
    pub duck_dns_domain: String,
    pub n8n_port: u16,
    pub n8n_webhook_url: String,
    pub ssh_public_key: String,
    pub ssh_private_key_path: PathBuf,
    pub volume_mount_point: String,
    pub volume_device: String,
    /// Additional `[settings]` entries, also offered to the scripts.
    pub extra: BTreeMap<String, String>,
}

impl Settings {
    /// `(NAME, value)` pairs for placeholder substitution: the known
    /// settings in a fixed order, then the extra entries by name.
    pub fn script_variables(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("DUCK_DNS_TOKEN".to_string(), self.duck_dns_token.clone()),
            ("DUCK_DNS_DOMAIN".to_string(), self.duck_dns_domain.clone()),
            ("N8N_PORT".to_string(), self.n8n_port.to_string()),
            ("N8N_WEBHOOK_URL".to_string(), self.n8n_webhook_url.clone()),
            ("SSH_PUBLIC_KEY".to_string(), self.ssh_public_key.clone()),
            (
                "SSH_PRIVATE_KEY_PATH".to_string(),
                self.ssh_private_key_path.display().to_string(),
            ),
            ("VOLUME_MOUNT_POINT".to_string(), self.volume_mount_point.clone()),
            ("VOLUME_DEVICE".to_string(), self.volume_device.clone()),
        ];
        vars.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("duck_dns_token", &"<redacted>")
            .field("duck_dns_domain", &self.duck_dns_domain)
            .field("n8n_port", &self.n8n_port)
            .field("n8n_webhook_url", &self.n8n_webhook_url)
            .field("ssh_private_key_path", &self.ssh_private_key_path)
            .field("volume_mount_point", &self.volume_mount_point)
            .field("volume_device", &self.volume_device)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Validated engine knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_parallel: usize,
    pub state_dir: PathBuf,
    pub fingerprint_storage: FingerprintStorage,
    pub placeholder_policy: PlaceholderPolicy,
    pub provider_command: String,
    pub ssh_connect_timeout: Duration,
}

/// Validated configuration handed to the rest of the application.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: Settings,
    pub engine: EngineConfig,
    pub stack: StackSection,
}
