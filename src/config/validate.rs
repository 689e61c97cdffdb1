// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::model::{
    ConfigFile, EngineConfig, EngineSection, RawConfigFile, Settings, DEFAULTED_SETTINGS,
    REQUIRED_SETTINGS,
};
use crate::errors::{CloudstepError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CloudstepError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let settings = validate_settings(raw.settings)?;
        let engine = validate_engine(&raw.engine)?;
        Ok(ConfigFile {
            settings,
            engine,
            stack: raw.stack,
        })
    }
}

fn validate_settings(mut values: BTreeMap<String, String>) -> Result<Settings> {
    // Blank values count as missing.
    values.retain(|_, v| !v.trim().is_empty());

    let missing: Vec<String> = REQUIRED_SETTINGS
        .iter()
        .filter(|key| !values.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CloudstepError::MissingSettings(missing));
    }

    let mut take = |key: &str| values.remove(key).unwrap_or_default();

    let port_text = take("N8N_PORT");
    let n8n_port: u16 = port_text
        .trim()
        .parse()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| {
            CloudstepError::ConfigError(format!(
                "N8N_PORT must be a TCP port between 1 and 65535 (got '{port_text}')"
            ))
        })?;

    let mut settings = Settings {
        duck_dns_token: take("DUCK_DNS_TOKEN"),
        duck_dns_domain: take("DUCK_DNS_DOMAIN"),
        n8n_port,
        n8n_webhook_url: take("N8N_WEBHOOK_URL"),
        ssh_public_key: take("SSH_PUBLIC_KEY"),
        ssh_private_key_path: PathBuf::from(take("SSH_PRIVATE_KEY_PATH")),
        volume_mount_point: String::new(),
        volume_device: String::new(),
        extra: BTreeMap::new(),
    };

    for (key, default) in DEFAULTED_SETTINGS {
        let value = values.remove(key).unwrap_or_else(|| default.to_string());
        match key {
            "VOLUME_MOUNT_POINT" => settings.volume_mount_point = value,
            "VOLUME_DEVICE" => settings.volume_device = value,
            _ => {}
        }
    }

    for key in values.keys() {
        if !is_placeholder_name(key) {
            return Err(CloudstepError::ConfigError(format!(
                "setting name '{key}' must be upper-case letters, digits and underscores"
            )));
        }
    }
    settings.extra = values;

    Ok(settings)
}

fn validate_engine(engine: &EngineSection) -> Result<EngineConfig> {
    if engine.max_parallel == 0 {
        return Err(CloudstepError::ConfigError(
            "[engine].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    if engine.provider_command.trim().is_empty() {
        return Err(CloudstepError::ConfigError(
            "[engine].provider_command must not be empty".to_string(),
        ));
    }

    let ssh_connect_timeout = parse_duration(&engine.ssh_connect_timeout).map_err(|e| {
        CloudstepError::ConfigError(format!("[engine].ssh_connect_timeout: {e}"))
    })?;

    Ok(EngineConfig {
        max_parallel: engine.max_parallel,
        state_dir: engine.state_dir.clone(),
        fingerprint_storage: engine.fingerprint_storage,
        placeholder_policy: engine.placeholder_policy,
        provider_command: engine.provider_command.clone(),
        ssh_connect_timeout,
    })
}

fn is_placeholder_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RawConfigFile {
        let mut raw = RawConfigFile::default();
        for (k, v) in [
            ("DUCK_DNS_TOKEN", "tok"),
            ("DUCK_DNS_DOMAIN", "angel"),
            ("N8N_PORT", "5678"),
            ("N8N_WEBHOOK_URL", "https://angel.duckdns.org/"),
            ("SSH_PUBLIC_KEY", "ssh-ed25519 AAAA"),
            ("SSH_PRIVATE_KEY_PATH", "/home/me/.ssh/id_ed25519"),
        ] {
            raw.settings.insert(k.to_string(), v.to_string());
        }
        raw
    }

    #[test]
    fn every_missing_key_is_listed() {
        let mut raw = complete();
        raw.settings.remove("DUCK_DNS_TOKEN");
        raw.settings.insert("N8N_PORT".into(), "  ".into());

        match ConfigFile::try_from(raw) {
            Err(CloudstepError::MissingSettings(keys)) => {
                assert_eq!(keys, vec!["DUCK_DNS_TOKEN".to_string(), "N8N_PORT".to_string()]);
            }
            other => panic!("expected MissingSettings, got {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let cfg = ConfigFile::try_from(complete()).unwrap();
        assert_eq!(cfg.settings.volume_mount_point, "/opt/n8n-data");
        assert_eq!(cfg.settings.volume_device, "/dev/oracleoci/oraclevdb");
        assert_eq!(cfg.settings.n8n_port, 5678);
        assert_eq!(cfg.engine.max_parallel, 4);
    }

    #[test]
    fn port_must_be_numeric() {
        let mut raw = complete();
        raw.settings.insert("N8N_PORT".into(), "http".into());
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(CloudstepError::ConfigError(msg)) if msg.contains("N8N_PORT")
        ));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut raw = complete();
        raw.engine.max_parallel = 0;
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn extra_settings_become_script_variables() {
        let mut raw = complete();
        raw.settings.insert("N8N_TIMEZONE".into(), "Europe/Oslo".into());
        let cfg = ConfigFile::try_from(raw).unwrap();
        let vars = cfg.settings.script_variables();
        assert_eq!(vars[0].0, "DUCK_DNS_TOKEN");
        assert_eq!(
            vars.last(),
            Some(&("N8N_TIMEZONE".to_string(), "Europe/Oslo".to_string()))
        );
    }
}
