// src/trigger/mod.rs

//! Trigger evaluation for remote steps.
//!
//! - [`fingerprint`] computes the content-addressed digest of a step's
//!   inputs and decides whether the step has to run.
//! - [`store`] persists the last successful fingerprint per step.
//! - [`TriggerEvaluator`] ties both together for the executor backend.

pub mod fingerprint;
pub mod store;

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::errors::{CloudstepError, ExecutionError, Result};
use crate::graph::{OutputStore, RemoteStep};

pub use fingerprint::{fingerprint, should_run, Fingerprint};
pub use store::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore};

/// Outcome of evaluating a step's triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Inputs changed (or the step never ran); execute and record `fingerprint`.
    Run(Fingerprint),
    /// Same fingerprint as the last successful run; nothing to do.
    Unchanged(Fingerprint),
}

impl TriggerDecision {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            TriggerDecision::Run(fp) | TriggerDecision::Unchanged(fp) => fp,
        }
    }

    pub fn should_run(&self) -> bool {
        matches!(self, TriggerDecision::Run(_))
    }
}

/// Shared handle around a [`FingerprintStore`].
#[derive(Clone)]
pub struct TriggerEvaluator {
    store: Arc<Mutex<Box<dyn FingerprintStore>>>,
}

impl TriggerEvaluator {
    pub fn new(store: Box<dyn FingerprintStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryFingerprintStore::new()))
    }

    /// Resolve the step's trigger inputs against published outputs and compare
    /// with the recorded fingerprint.
    ///
    /// Must only be called once the step's dependencies succeeded; an output
    /// that is not published yet is an error rather than a placeholder value.
    pub fn evaluate(
        &self,
        step: &RemoteStep,
        outputs: &OutputStore,
    ) -> std::result::Result<TriggerDecision, ExecutionError> {
        let inputs = step.fingerprint_inputs(outputs)?;
        let current = fingerprint(&inputs);
        let last = self
            .last_known(&step.id)
            .map_err(|e| ExecutionError::Local(e.to_string()))?;

        if should_run(&step.id, &inputs, last.as_ref()) {
            debug!(
                step = %step.id,
                fingerprint = %current,
                previous = ?last.as_ref().map(Fingerprint::as_str),
                "trigger inputs changed; step will run"
            );
            Ok(TriggerDecision::Run(current))
        } else {
            info!(step = %step.id, fingerprint = %current, "trigger inputs unchanged; skipping step");
            Ok(TriggerDecision::Unchanged(current))
        }
    }

    pub fn last_known(&self, step_id: &str) -> Result<Option<Fingerprint>> {
        let store = self.lock()?;
        Ok(store.load(step_id)?.map(Fingerprint::from_hex))
    }

    /// Record the fingerprint of a successful run.
    pub fn record(&self, step_id: &str, fp: &Fingerprint) -> Result<()> {
        let mut store = self.lock()?;
        store.save(step_id, fp.as_str())?;
        Ok(())
    }

    /// Forget fingerprints for steps that are no longer declared.
    pub fn prune(&self, active_steps: &[&str]) -> Result<()> {
        let mut store = self.lock()?;
        store.prune(active_steps)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn FingerprintStore>>> {
        self.store
            .lock()
            .map_err(|_| CloudstepError::Other(anyhow::anyhow!("fingerprint store lock poisoned")))
    }
}

impl std::fmt::Debug for TriggerEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEvaluator").finish_non_exhaustive()
    }
}
