// src/graph/node.rs

use crate::graph::input::{Input, NodeId, OutputRef, ResourceConfig};
use crate::graph::step::RemoteStep;

/// Lifecycle options forwarded to the provider with a create request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Delete the existing resource before creating its replacement when the
    /// configuration changes incompatibly.
    pub delete_before_replace: bool,
}

/// A cloud resource managed through the provider capability.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    /// Provider type name, e.g. `oci:core/Vcn`.
    pub kind: String,
    pub config: ResourceConfig,
    pub options: ResourceOptions,
}

/// Read-only provider query for availability candidates; the first match
/// becomes the node's outputs (`name`, `id`).
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSpec {
    pub compartment: Input,
    /// Regular expression matched against candidate names.
    pub name_pattern: String,
}

impl LookupSpec {
    pub fn new(compartment: impl Into<Input>, name_pattern: impl Into<String>) -> Self {
        Self {
            compartment: compartment.into(),
            name_pattern: name_pattern.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Resource(ResourceSpec),
    Lookup(LookupSpec),
    Step(RemoteStep),
}

/// A declared node plus its explicit dependency edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Nodes that must succeed before this one starts.
    pub deps: Vec<NodeId>,
}

impl Node {
    pub fn label(&self) -> &'static str {
        match self.kind {
            NodeKind::Resource(_) => "resource",
            NodeKind::Lookup(_) => "lookup",
            NodeKind::Step(_) => "step",
        }
    }

    pub fn is_step(&self) -> bool {
        matches!(self.kind, NodeKind::Step(_))
    }

    /// Output references this node reads when it runs.
    pub fn consumed_outputs(&self) -> Vec<&OutputRef> {
        match &self.kind {
            NodeKind::Resource(spec) => spec.config.output_refs(),
            NodeKind::Lookup(spec) => spec.compartment.output_refs(),
            NodeKind::Step(step) => step.output_refs(),
        }
    }
}

/// Returned by the builder for every declared node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: NodeId,
}

impl NodeHandle {
    pub(crate) fn new(id: NodeId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reference to one of this node's (eventually available) output attributes.
    pub fn output(&self, attribute: &str) -> OutputRef {
        OutputRef::new(self.id.clone(), attribute)
    }

    /// Shorthand for the provider-assigned identity, `output("id")`.
    pub fn id_output(&self) -> OutputRef {
        self.output("id")
    }
}

impl AsRef<str> for NodeHandle {
    fn as_ref(&self) -> &str {
        &self.id
    }
}
