// tests/settings_loading.rs

use std::collections::HashMap;
use std::io::Write;

use cloudstep::config::{apply_env_overrides, load_from_path, ConfigFile};
use cloudstep::errors::CloudstepError;
use cloudstep::types::FingerprintStorage;
use cloudstep_test_utils::builders::ConfigFileBuilder;
use tempfile::NamedTempFile;

#[test]
fn missing_settings_are_all_reported() {
    let raw = ConfigFileBuilder::new()
        .without("SSH_PUBLIC_KEY")
        .without("DUCK_DNS_DOMAIN")
        .raw();

    match ConfigFile::try_from(raw) {
        Err(CloudstepError::MissingSettings(keys)) => {
            assert_eq!(keys, vec!["DUCK_DNS_DOMAIN".to_string(), "SSH_PUBLIC_KEY".to_string()]);
            let msg = CloudstepError::MissingSettings(keys).to_string();
            assert!(msg.contains("DUCK_DNS_DOMAIN, SSH_PUBLIC_KEY"), "{msg}");
        }
        other => panic!("expected MissingSettings, got {other:?}"),
    }
}

#[test]
fn settings_file_and_environment_combine() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[settings]
DUCK_DNS_DOMAIN = "angel"
N8N_PORT = "5678"
N8N_WEBHOOK_URL = "https://angel.duckdns.org/"
SSH_PRIVATE_KEY_PATH = "/home/me/.ssh/id_ed25519"
VOLUME_MOUNT_POINT = "/srv/n8n"

[engine]
max_parallel = 3
fingerprint_storage = "memory"
ssh_connect_timeout = "45s"

[stack]
availability_domain_pattern = "AD-2$"
"#
    )
    .unwrap();

    let raw = load_from_path(file.path()).unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
        ("DUCK_DNS_TOKEN", "secret"),
        ("SSH_PUBLIC_KEY", "ssh-ed25519 AAAA me"),
        ("N8N_PORT", "8443"),
    ]);
    let raw = apply_env_overrides(raw, |k| env.get(k).map(|v| v.to_string()));
    let cfg = ConfigFile::try_from(raw).unwrap();

    assert_eq!(cfg.settings.duck_dns_token, "secret");
    assert_eq!(cfg.settings.n8n_port, 8443);
    assert_eq!(cfg.settings.volume_mount_point, "/srv/n8n");
    assert_eq!(cfg.settings.volume_device, "/dev/oracleoci/oraclevdb");
    assert_eq!(cfg.engine.max_parallel, 3);
    assert_eq!(cfg.engine.fingerprint_storage, FingerprintStorage::Memory);
    assert_eq!(cfg.engine.ssh_connect_timeout.as_secs(), 45);
    assert_eq!(cfg.stack.availability_domain_pattern, "AD-2$");
    assert_eq!(cfg.stack.shape, "VM.Standard.E5.Flex");

    // Secrets stay out of debug output.
    let debug = format!("{:?}", cfg.settings);
    assert!(!debug.contains("secret"), "{debug}");
}

#[test]
fn invalid_engine_values_are_rejected() {
    let mut raw = ConfigFileBuilder::new().raw();
    raw.engine.ssh_connect_timeout = "soon".to_string();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(CloudstepError::ConfigError(msg)) if msg.contains("ssh_connect_timeout")
    ));

    let raw = ConfigFileBuilder::new().max_parallel(0).raw();
    assert!(matches!(ConfigFile::try_from(raw), Err(CloudstepError::ConfigError(_))));
}

#[test]
fn lower_case_extra_setting_is_rejected() {
    let raw = ConfigFileBuilder::new().setting("n8n_timezone", "UTC").raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(CloudstepError::ConfigError(msg)) if msg.contains("n8n_timezone")
    ));
}
