// src/graph/builder.rs

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use crate::errors::{CloudstepError, Result};
use crate::graph::input::{NodeId, ResourceConfig};
use crate::graph::node::{LookupSpec, Node, NodeHandle, NodeKind, ResourceOptions, ResourceSpec};
use crate::graph::provision::ProvisionGraph;
use crate::graph::step::{
    shell_quote, RemoteStep, StepCommand, Target, TriggerInput, DEFAULT_STEP_TIMEOUT,
};
use crate::graph::validate::validate_nodes;
use crate::script::ScriptPayload;

/// Declaration API for the provisioning graph.
///
/// Declaring a node only records intent and edges; nothing talks to the
/// provider or to a remote host until the graph is applied. Edges may name
/// nodes declared later, so edge checks happen in [`GraphBuilder::build`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    ids: HashSet<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Declare a cloud resource.
    pub fn resource<I>(
        &mut self,
        id: &str,
        kind: &str,
        config: ResourceConfig,
        deps: I,
    ) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.resource_with_options(id, kind, config, ResourceOptions::default(), deps)
    }

    pub fn resource_with_options<I>(
        &mut self,
        id: &str,
        kind: &str,
        config: ResourceConfig,
        options: ResourceOptions,
        deps: I,
    ) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let spec = ResourceSpec {
            kind: kind.to_string(),
            config,
            options,
        };
        self.declare(id.to_string(), NodeKind::Resource(spec), deps)
    }

    /// Declare a read-only availability lookup.
    pub fn lookup<I>(&mut self, id: &str, spec: LookupSpec, deps: I) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.declare(id.to_string(), NodeKind::Lookup(spec), deps)
    }

    /// Declare a remote step.
    pub fn step<I>(&mut self, step: RemoteStep, deps: I) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let id = step.id.clone();
        self.declare(id, NodeKind::Step(step), deps)
    }

    /// Declare a script as two nodes: `<id>-deliver` copies the payload to the
    /// target, `<id>` runs it with elevated privilege.
    ///
    /// Both carry the same trigger list plus the payload text, so editing the
    /// script re-runs delivery and invocation together. The returned handle is
    /// the invocation node.
    pub fn script_step<I>(&mut self, spec: ScriptStep, deps: I) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let deliver_id = format!("{}-deliver", spec.id);

        let deliver = RemoteStep::new(
            deliver_id.clone(),
            spec.target.clone(),
            StepCommand::Deliver {
                remote_path: spec.remote_path.clone(),
                payload: spec.payload.clone(),
            },
        )
        .triggers(spec.triggers.iter().cloned())
        .timeout(spec.timeout)
        .retry_connection(spec.retry_connection);

        let invoke = RemoteStep::new(
            spec.id.clone(),
            spec.target,
            StepCommand::shell(format!("sudo bash {}", shell_quote(&spec.remote_path))),
        )
        .triggers(spec.triggers)
        .trigger(spec.payload.text())
        .timeout(spec.timeout)
        .retry_connection(spec.retry_connection);

        self.step(deliver, deps)?;
        self.step(invoke, [deliver_id])
    }

    fn declare<I>(&mut self, id: NodeId, kind: NodeKind, deps: I) -> Result<NodeHandle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if !self.ids.insert(id.clone()) {
            return Err(CloudstepError::GraphIntegrity(format!(
                "node '{}' is declared more than once",
                id
            )));
        }

        let mut dep_ids: Vec<NodeId> = Vec::new();
        for dep in deps {
            let dep = dep.as_ref().to_string();
            if !dep_ids.contains(&dep) {
                dep_ids.push(dep);
            }
        }

        let node = Node {
            id: id.clone(),
            kind,
            deps: dep_ids,
        };
        debug!(node = %node.id, kind = node.label(), deps = ?node.deps, "declared node");
        self.nodes.push(node);

        Ok(NodeHandle::new(id))
    }

    /// Validate edges and produce the immutable graph.
    ///
    /// Fails with [`CloudstepError::GraphIntegrity`] on unknown or self
    /// dependencies, cycles, and outputs read without a dependency edge.
    pub fn build(self) -> Result<ProvisionGraph> {
        let topo = validate_nodes(&self.nodes)?;
        Ok(ProvisionGraph::new(self.nodes, topo))
    }
}

/// Input to [`GraphBuilder::script_step`].
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub id: NodeId,
    pub target: Target,
    pub payload: ScriptPayload,
    pub remote_path: String,
    pub triggers: Vec<TriggerInput>,
    pub timeout: Duration,
    /// Applied to both the delivery and the invocation node.
    pub retry_connection: bool,
}

impl ScriptStep {
    /// Defaults the remote path to `/tmp/<id>.sh`.
    pub fn new(id: impl Into<NodeId>, target: Target, payload: ScriptPayload) -> Self {
        let id = id.into();
        Self {
            remote_path: format!("/tmp/{id}.sh"),
            id,
            target,
            payload,
            triggers: Vec::new(),
            timeout: DEFAULT_STEP_TIMEOUT,
            retry_connection: false,
        }
    }

    pub fn remote_path(mut self, path: impl Into<String>) -> Self {
        self.remote_path = path.into();
        self
    }

    pub fn trigger(mut self, input: impl Into<TriggerInput>) -> Self {
        self.triggers.push(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_connection(mut self, retry: bool) -> Self {
        self.retry_connection = retry;
        self
    }
}
