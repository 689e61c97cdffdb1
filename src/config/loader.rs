// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile, DEFAULTED_SETTINGS, REQUIRED_SETTINGS};
use crate::errors::{CloudstepError, Result};

/// Read a settings file and return the raw, unvalidated configuration.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Overlay `[settings]` with values from `lookup` (normally the process
/// environment). A variable that is set wins over the file.
///
/// Every name already present in the file is looked up as well as the
/// well-known ones, so extra settings can be overridden too.
pub fn apply_env_overrides<F>(mut raw: RawConfigFile, lookup: F) -> RawConfigFile
where
    F: Fn(&str) -> Option<String>,
{
    let mut names: Vec<String> = REQUIRED_SETTINGS
        .iter()
        .copied()
        .chain(DEFAULTED_SETTINGS.iter().map(|(k, _)| *k))
        .map(str::to_string)
        .collect();
    names.extend(raw.settings.keys().cloned());
    names.sort();
    names.dedup();

    for name in names {
        if let Some(value) = lookup(&name) {
            debug!(setting = %name, "setting taken from environment");
            raw.settings.insert(name, value);
        }
    }
    raw
}

/// Load the `.env` file: an explicit path must exist, the implicit `./.env`
/// is optional.
pub fn load_env_file(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                CloudstepError::ConfigError(format!("cannot load env file {}: {e}", path.display()))
            })?;
            info!(path = %path.display(), "loaded env file");
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                info!(path = %path.display(), "loaded .env");
            }
        }
    }
    Ok(())
}

/// Recommended entry point for the rest of the application:
///
/// - reads the settings file (a missing default file means "all defaults";
///   a missing explicit file is an error)
/// - overlays the process environment
/// - validates into a [`ConfigFile`]
pub fn load_and_validate(path: Option<&Path>, env_file: Option<&Path>) -> Result<ConfigFile> {
    load_env_file(env_file)?;

    let raw = match path {
        Some(p) => load_from_path(p)?,
        None => {
            let default = default_settings_path();
            if default.exists() {
                load_from_path(&default)?
            } else {
                debug!("no {} found; using defaults", default.display());
                RawConfigFile::default()
            }
        }
    };

    let raw = apply_env_overrides(raw, |name| std::env::var(name).ok());
    ConfigFile::try_from(raw)
}

/// `Cloudstep.toml` in the current working directory.
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("Cloudstep.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn file_values_are_read_and_environment_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[settings]
DUCK_DNS_DOMAIN = "from-file"
N8N_PORT = "5678"
CUSTOM_FLAG = "a"

[engine]
max_parallel = 2
fingerprint_storage = "memory"
"#
        )
        .unwrap();

        let raw = load_from_path(file.path()).unwrap();
        assert_eq!(raw.engine.max_parallel, 2);

        let env: HashMap<&str, &str> =
            HashMap::from([("DUCK_DNS_DOMAIN", "from-env"), ("CUSTOM_FLAG", "b")]);
        let raw = apply_env_overrides(raw, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(raw.settings["DUCK_DNS_DOMAIN"], "from-env");
        assert_eq!(raw.settings["N8N_PORT"], "5678");
        assert_eq!(raw.settings["CUSTOM_FLAG"], "b");
    }

    #[test]
    fn malformed_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nmax_parallel = ").unwrap();
        assert!(matches!(
            load_from_path(file.path()),
            Err(CloudstepError::TomlError(_))
        ));
    }

    #[test]
    fn missing_explicit_env_file_is_an_error() {
        let err = load_env_file(Some(Path::new("/definitely/not/here/.env"))).unwrap_err();
        assert!(matches!(err, CloudstepError::ConfigError(_)));
    }
}
