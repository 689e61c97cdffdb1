// src/graph/provision.rs

use std::collections::HashMap;

use crate::graph::input::NodeId;
use crate::graph::node::Node;

/// Validated, immutable provisioning graph.
///
/// Only [`GraphBuilder::build`](crate::graph::GraphBuilder::build) constructs
/// one, so every edge points at a declared node and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct ProvisionGraph {
    nodes: HashMap<NodeId, Node>,
    /// Declaration order, used to keep listings stable.
    declared: Vec<NodeId>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    topo: Vec<NodeId>,
}

impl ProvisionGraph {
    pub(crate) fn new(nodes: Vec<Node>, topo: Vec<NodeId>) -> Self {
        let declared: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();

        let mut dependents: HashMap<NodeId, Vec<NodeId>> =
            declared.iter().map(|id| (id.clone(), Vec::new())).collect();
        for node in &nodes {
            for dep in &node.deps {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(node.id.clone());
                }
            }
        }

        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        Self {
            nodes,
            declared,
            dependents,
            topo,
        }
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.declared.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Immediate dependencies of a node.
    pub fn dependencies_of(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a node (nodes that list it as a dependency).
    pub fn dependents_of(&self, id: &str) -> &[NodeId] {
        self.dependents
            .get(id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes with no dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.node_ids()
            .filter(|id| self.dependencies_of(id).is_empty())
    }

    /// A topological order: every node appears after all of its dependencies.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topo
    }

    /// Group nodes by depth (longest dependency chain from a root). Nodes in
    /// the same layer have no edge between them.
    pub fn layers(&self) -> Vec<Vec<NodeId>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        for id in &self.topo {
            let d = self
                .dependencies_of(id)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_str(), d);
        }

        let max = depth.values().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut layers = vec![Vec::new(); max];
        for id in &self.declared {
            if let Some(d) = depth.get(id.as_str()) {
                layers[*d].push(id.clone());
            }
        }
        layers
    }
}
