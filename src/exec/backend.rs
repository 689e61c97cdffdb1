// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of running nodes itself.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production implementation here.
//!
//! - `ProvisionBackend` is the implementation used by `cloudstep`: resources
//!   and lookups go to the [`Provider`], remote steps go through the trigger
//!   evaluator and the [`StepExecutor`].
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which nodes were dispatched and directly emits completion events.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context};
use regex::Regex;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledNode;
use crate::engine::{NodeOutcome, RuntimeEvent};
use crate::errors::Result;
use crate::exec::executor::StepExecutor;
use crate::graph::{LookupSpec, NodeKind, OutputStore, RemoteStep, ResourceSpec};
use crate::provider::{CandidateFilter, CreateRequest, Provider};
use crate::trigger::{TriggerDecision, TriggerEvaluator};

/// Lines of command output kept in a failure message.
const OUTPUT_TAIL_LINES: usize = 5;

/// Trait abstracting how scheduled nodes are executed.
///
/// Implementations must eventually send exactly one
/// `RuntimeEvent::NodeCompleted` per dispatched node, preceded by a
/// `RuntimeEvent::NodeStarted` when work actually begins.
pub trait ExecutorBackend: Send {
    /// Dispatch the given nodes for execution without waiting for them.
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend.
///
/// Every dispatched node runs in its own Tokio task; a semaphore bounds how
/// many run at once.
pub struct ProvisionBackend {
    shared: Arc<Shared>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

struct Shared {
    provider: Arc<dyn Provider>,
    executor: StepExecutor,
    evaluator: TriggerEvaluator,
    outputs: Arc<RwLock<OutputStore>>,
    permits: Arc<Semaphore>,
}

impl ProvisionBackend {
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: StepExecutor,
        evaluator: TriggerEvaluator,
        max_parallel: usize,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                executor,
                evaluator,
                outputs: Arc::new(RwLock::new(OutputStore::new())),
                permits: Arc::new(Semaphore::new(max_parallel.max(1))),
            }),
            runtime_tx,
        }
    }

    /// Outputs published so far (shared with the running tasks).
    pub fn outputs(&self) -> Arc<RwLock<OutputStore>> {
        self.shared.outputs.clone()
    }
}

impl ExecutorBackend for ProvisionBackend {
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for node in nodes {
                let shared = self.shared.clone();
                let tx = self.runtime_tx.clone();
                tokio::spawn(async move {
                    run_scheduled(shared, node, tx).await;
                });
            }
            Ok(())
        })
    }
}

async fn run_scheduled(shared: Arc<Shared>, node: ScheduledNode, tx: mpsc::Sender<RuntimeEvent>) {
    let id = node.id.clone();

    let outcome = match shared.permits.clone().acquire_owned().await {
        Ok(_permit) => {
            if tx
                .send(RuntimeEvent::NodeStarted {
                    node: id.clone(),
                    at: Instant::now(),
                })
                .await
                .is_err()
            {
                debug!(node = %id, "runtime gone before node started; dropping");
                return;
            }
            shared.run_node(&node).await
        }
        Err(_) => NodeOutcome::Failed("executor slots closed".to_string()),
    };

    let event = RuntimeEvent::NodeCompleted {
        node: id.clone(),
        outcome,
        at: Instant::now(),
    };
    if tx.send(event).await.is_err() {
        debug!(node = %id, "runtime gone before completion was reported");
    }
}

impl Shared {
    async fn run_node(&self, node: &ScheduledNode) -> NodeOutcome {
        let result = match &node.kind {
            NodeKind::Resource(spec) => self.create_resource(&node.id, spec).await,
            NodeKind::Lookup(spec) => self.lookup(&node.id, spec).await,
            NodeKind::Step(step) => return self.run_step(step).await,
        };

        match result {
            Ok(()) => NodeOutcome::Succeeded { executed: true },
            Err(err) => {
                error!(node = %node.id, error = %format!("{err:#}"), "node failed");
                NodeOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    async fn create_resource(&self, id: &str, spec: &ResourceSpec) -> anyhow::Result<()> {
        let config = {
            let outputs = self.read_outputs()?;
            spec.config
                .resolve(&outputs)
                .with_context(|| format!("resolving configuration of '{id}'"))?
        };

        let request = CreateRequest {
            name: id.to_string(),
            kind: spec.kind.clone(),
            config,
            delete_before_replace: spec.options.delete_before_replace,
        };

        info!(node = %id, kind = %spec.kind, "creating resource");
        let created = self
            .provider
            .create_resource(&request)
            .await
            .with_context(|| format!("provider could not create '{id}'"))?;

        self.publish(id, created.into_attributes())
    }

    async fn lookup(&self, id: &str, spec: &LookupSpec) -> anyhow::Result<()> {
        let compartment_id = {
            let outputs = self.read_outputs()?;
            spec.compartment
                .resolve_string(&outputs)
                .with_context(|| format!("resolving compartment of '{id}'"))?
        };
        let pattern = Regex::new(&spec.name_pattern)
            .with_context(|| format!("invalid name pattern '{}'", spec.name_pattern))?;

        let candidates = self
            .provider
            .list_availability_candidates(&CandidateFilter {
                compartment_id,
                name_pattern: spec.name_pattern.clone(),
            })
            .await
            .with_context(|| format!("listing availability candidates for '{id}'"))?;

        let total = candidates.len();
        let chosen = candidates
            .into_iter()
            .find(|c| pattern.is_match(&c.name))
            .ok_or_else(|| {
                anyhow!(
                    "no availability candidate matches '{}' ({} listed)",
                    spec.name_pattern,
                    total
                )
            })?;

        info!(node = %id, candidate = %chosen.name, "selected availability candidate");
        self.publish(
            id,
            [
                ("name".to_string(), chosen.name),
                ("id".to_string(), chosen.id),
            ],
        )
    }

    async fn run_step(&self, step: &RemoteStep) -> NodeOutcome {
        let prepared = self.read_outputs().and_then(|outputs| {
            let decision = self.evaluator.evaluate(step, &outputs)?;
            let target = step.target.resolve(&outputs)?;
            Ok((decision, target))
        });

        let (decision, target) = match prepared {
            Ok(p) => p,
            Err(err) => {
                error!(step = %step.id, error = %err, "cannot prepare remote step");
                return NodeOutcome::Failed(format!("{err:#}"));
            }
        };

        if let TriggerDecision::Unchanged(_) = decision {
            return NodeOutcome::Succeeded { executed: false };
        }

        match self
            .executor
            .execute(step, &target, step.command.resolve())
            .await
        {
            Ok(output) => {
                debug!(step = %step.id, elapsed = ?output.elapsed, "step output:\n{}", output.output);
                if let Err(err) = self.evaluator.record(&step.id, decision.fingerprint()) {
                    error!(step = %step.id, error = %err, "could not record fingerprint");
                    return NodeOutcome::Failed(format!("recording fingerprint: {err}"));
                }
                NodeOutcome::Succeeded { executed: true }
            }
            Err(err) if err.is_timeout() => NodeOutcome::TimedOut(err.to_string()),
            Err(err) => {
                let message = match &err {
                    crate::errors::ExecutionError::NonZeroExit { output, .. } => {
                        let tail = tail_lines(output, OUTPUT_TAIL_LINES);
                        warn!(step = %step.id, "failing command output:\n{}", output);
                        if tail.is_empty() {
                            err.to_string()
                        } else {
                            format!("{err}: {tail}")
                        }
                    }
                    _ => err.to_string(),
                };
                NodeOutcome::Failed(message)
            }
        }
    }

    fn read_outputs(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, OutputStore>> {
        self.outputs
            .read()
            .map_err(|_| anyhow!("output store lock poisoned"))
    }

    fn publish<I>(&self, id: &str, attributes: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut outputs = self
            .outputs
            .write()
            .map_err(|_| anyhow!("output store lock poisoned"))?;
        outputs.publish(id, attributes);
        debug!(node = %id, attributes = ?outputs.attributes(id), "published outputs");
        Ok(())
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_non_empty_lines() {
        assert_eq!(tail_lines("a\nb\n\nc\nd\n", 2), "c | d");
        assert_eq!(tail_lines("", 3), "");
    }
}
