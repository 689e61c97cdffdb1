#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cloudstep::config::{ConfigFile, RawConfigFile};
use cloudstep::fs::mock::MockFileSystem;
use cloudstep::graph::{Credential, GraphBuilder, NodeHandle, ResourceConfig, Target};
use cloudstep::script::ScriptLoader;
use cloudstep::types::{FingerprintStorage, PlaceholderPolicy};

/// Builder for `ConfigFile` to simplify test setup. Starts with every
/// required setting filled in.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        for (k, v) in [
            ("DUCK_DNS_TOKEN", "duck-token"),
            ("DUCK_DNS_DOMAIN", "angel"),
            ("N8N_PORT", "5678"),
            ("N8N_WEBHOOK_URL", "https://angel.duckdns.org/"),
            ("SSH_PUBLIC_KEY", "ssh-ed25519 AAAAC3Nza test@host"),
            ("SSH_PRIVATE_KEY_PATH", "/tmp/cloudstep-test-key"),
        ] {
            config.settings.insert(k.to_string(), v.to_string());
        }
        config.engine.fingerprint_storage = FingerprintStorage::Memory;
        Self { config }
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.config.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.config.settings.remove(key);
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.config.engine.max_parallel = n;
        self
    }

    pub fn placeholder_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.config.engine.placeholder_policy = policy;
        self
    }

    pub fn scripts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.stack.scripts_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub const FIXTURE_COMPOSE: &str = "services:\n  n8n:\n    ports:\n      - \"__N8N_PORT__:5678\"\n    volumes:\n      - __VOLUME_MOUNT_POINT__:/home/node/.n8n\n";

/// In-memory copy of the five stack payloads under `init/`.
pub fn fixture_scripts() -> MockFileSystem {
    MockFileSystem::new()
        .with_file("init/cloud-init.sh", "#!/bin/bash\nfirewall-cmd --add-port=__N8N_PORT__/tcp\n")
        .with_file(
            "init/volume-mount.sh",
            "#!/bin/bash\nmkfs.ext4 __VOLUME_DEVICE__\nmount __VOLUME_DEVICE__ __VOLUME_MOUNT_POINT__\n",
        )
        .with_file(
            "init/duckdns.sh",
            "#!/bin/bash\ncurl 'https://www.duckdns.org/update?domains=__DUCK_DNS_DOMAIN__&token=__DUCK_DNS_TOKEN__'\n",
        )
        .with_file("init/docker-compose.yml", FIXTURE_COMPOSE)
        .with_file(
            "init/n8n.sh",
            "#!/bin/bash\ncat > /opt/n8n/docker-compose.yml <<'EOF'\n__DOCKER_COMPOSE_CONTENT__\nEOF\ndocker compose up -d\n",
        )
}

/// Loader over [`fixture_scripts`] rooted at `init`.
pub fn fixture_loader(policy: PlaceholderPolicy) -> ScriptLoader {
    ScriptLoader::new(Arc::new(fixture_scripts()), "init").with_policy(policy)
}

/// Declare `ids` as a chain of resources, each depending on the previous one.
pub fn resource_chain(b: &mut GraphBuilder, ids: &[&str]) -> Vec<NodeHandle> {
    let mut handles: Vec<NodeHandle> = Vec::new();
    for id in ids {
        let deps: Vec<String> = handles.last().map(|h| h.id().to_string()).into_iter().collect();
        let handle = b
            .resource(id, "test:Resource", ResourceConfig::new(), deps)
            .expect("declaring chain resource");
        handles.push(handle);
    }
    handles
}

/// Target reading its host from `instance`'s `public_ip` output.
pub fn target_on(instance: &NodeHandle) -> Target {
    Target::new(instance.output("public_ip"), "opc", Credential::Agent)
}
