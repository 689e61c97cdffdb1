// src/script/loader.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{CloudstepError, Result};
use crate::fs::FileSystem;
use crate::script::placeholder::{substitute, unresolved_placeholders};
use crate::types::PlaceholderPolicy;

/// Immutable script text after substitution.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptPayload {
    name: String,
    text: String,
}

impl ScriptPayload {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Display name (the path the payload was loaded from).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholders left in the text after substitution.
    pub fn unresolved(&self) -> Vec<String> {
        unresolved_placeholders(&self.text)
    }

    /// Apply further substitutions, producing a new payload with the same name.
    pub fn substituted<K, V>(&self, variables: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::new(self.name.clone(), substitute(&self.text, variables))
    }
}

// Payloads can embed secrets; keep them out of debug logs.
impl fmt::Debug for ScriptPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptPayload")
            .field("name", &self.name)
            .field("len", &self.text.len())
            .finish()
    }
}

/// Reads payloads relative to a scripts directory and substitutes variables.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    policy: PlaceholderPolicy,
}

impl ScriptLoader {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            policy: PlaceholderPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PlaceholderPolicy {
        self.policy
    }

    /// Read `path` (relative to the scripts directory) and substitute
    /// `variables` in order.
    ///
    /// Leftover placeholders are handled according to the loader's policy.
    pub fn load<K, V>(&self, path: impl AsRef<Path>, variables: &[(K, V)]) -> Result<ScriptPayload>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let full = self.root.join(path.as_ref());
        let raw = self.fs.read_to_string(&full)?;
        let payload = ScriptPayload::new(path.as_ref().display().to_string(), substitute(&raw, variables));

        debug!(
            script = %payload.name(),
            variables = variables.len(),
            "loaded script payload"
        );

        self.check(&payload)?;
        Ok(payload)
    }

    /// Apply the placeholder policy to an already-built payload.
    pub fn check(&self, payload: &ScriptPayload) -> Result<()> {
        if self.policy == PlaceholderPolicy::Lenient {
            return Ok(());
        }

        let names = payload.unresolved();
        if names.is_empty() {
            return Ok(());
        }

        match self.policy {
            PlaceholderPolicy::Deny => Err(CloudstepError::UnresolvedPlaceholders {
                script: payload.name().to_string(),
                names,
            }),
            _ => {
                warn!(
                    script = %payload.name(),
                    placeholders = ?names,
                    "script payload still contains placeholders"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn loader(policy: PlaceholderPolicy) -> ScriptLoader {
        let fs = MockFileSystem::new()
            .with_file("init/duckdns.sh", "echo url=https://x/?domains=__DUCK_DNS_DOMAIN__&token=__DUCK_DNS_TOKEN__");
        ScriptLoader::new(Arc::new(fs), "init").with_policy(policy)
    }

    #[test]
    fn load_reads_relative_to_root_and_substitutes() {
        let payload = loader(PlaceholderPolicy::Deny)
            .load(
                "duckdns.sh",
                &[("DUCK_DNS_DOMAIN", "angel"), ("DUCK_DNS_TOKEN", "t0k")],
            )
            .unwrap();
        assert_eq!(payload.name(), "duckdns.sh");
        assert_eq!(payload.text(), "echo url=https://x/?domains=angel&token=t0k");
    }

    #[test]
    fn lenient_policy_keeps_leftovers() {
        let payload = loader(PlaceholderPolicy::Lenient)
            .load("duckdns.sh", &[("DUCK_DNS_DOMAIN", "angel")])
            .unwrap();
        assert_eq!(payload.unresolved(), vec!["DUCK_DNS_TOKEN".to_string()]);
    }

    #[test]
    fn deny_policy_rejects_leftovers() {
        let err = loader(PlaceholderPolicy::Deny)
            .load("duckdns.sh", &[("DUCK_DNS_DOMAIN", "angel")])
            .unwrap_err();
        match err {
            CloudstepError::UnresolvedPlaceholders { script, names } => {
                assert_eq!(script, "duckdns.sh");
                assert_eq!(names, vec!["DUCK_DNS_TOKEN".to_string()]);
            }
            other => panic!("expected UnresolvedPlaceholders, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let empty: [(&str, &str); 0] = [];
        assert!(loader(PlaceholderPolicy::Lenient).load("nope.sh", &empty).is_err());
    }
}
