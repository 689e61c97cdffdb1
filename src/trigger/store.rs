// src/trigger/store.rs

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// File name (inside the state directory) holding step fingerprints.
pub const FINGERPRINT_FILE: &str = "fingerprints";

/// Abstract storage for the last successful fingerprint of each step.
pub trait FingerprintStore: Send + Sync {
    fn load(&self, step: &str) -> Result<Option<String>>;
    fn save(&mut self, step: &str, fingerprint: &str) -> Result<()>;
    /// Remove fingerprints for steps that are not in `active_steps`.
    fn prune(&mut self, active_steps: &[&str]) -> Result<()>;
}

/// Stores fingerprints in `<state_dir>/fingerprints`, one `step hash` pair per line.
pub struct FileFingerprintStore {
    state_dir: PathBuf,
}

impl FileFingerprintStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.state_dir.join(FINGERPRINT_FILE)
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn load(&self, step: &str) -> Result<Option<String>> {
        let map = load_all(&self.path())?;
        Ok(map.get(step).cloned())
    }

    fn save(&mut self, step: &str, fingerprint: &str) -> Result<()> {
        let path = self.path();
        let mut map = load_all(&path)?;
        map.insert(step.to_string(), fingerprint.to_string());
        save_all(&path, &map)?;
        info!(step = %step, fingerprint = %fingerprint, "recorded step fingerprint (file)");
        Ok(())
    }

    fn prune(&mut self, active_steps: &[&str]) -> Result<()> {
        let path = self.path();
        let mut map = load_all(&path)?;
        let initial_len = map.len();
        map.retain(|k, _| active_steps.contains(&k.as_str()));

        if map.len() < initial_len {
            save_all(&path, &map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale step fingerprints (file)"
            );
        }
        Ok(())
    }
}

/// Keeps fingerprints in memory only.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    map: BTreeMap<String, String>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn load(&self, step: &str) -> Result<Option<String>> {
        Ok(self.map.get(step).cloned())
    }

    fn save(&mut self, step: &str, fingerprint: &str) -> Result<()> {
        self.map.insert(step.to_string(), fingerprint.to_string());
        info!(step = %step, fingerprint = %fingerprint, "recorded step fingerprint (memory)");
        Ok(())
    }

    fn prune(&mut self, active_steps: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_steps.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale step fingerprints (memory)"
            );
        }
        Ok(())
    }
}

fn load_all(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let file = File::open(path).with_context(|| format!("opening fingerprint file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = BTreeMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((step, hash)) = trimmed.split_once(char::is_whitespace) {
            map.insert(step.to_string(), hash.trim().to_string());
        }
    }

    Ok(map)
}

fn save_all(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory at {:?}", parent))?;
    }

    // Write a sibling file and rename so a crash never leaves a truncated store.
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)
            .with_context(|| format!("creating fingerprint file at {:?}", tmp))?;
        let mut writer = BufWriter::new(file);
        for (step, hash) in map {
            writeln!(writer, "{} {}", step, hash)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing fingerprint file at {:?}", path))?;
    Ok(())
}
