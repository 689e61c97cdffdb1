// src/graph/outputs.rs

use std::collections::{BTreeMap, HashMap};

use crate::graph::input::{NodeId, OutputRef};

/// Output attributes of nodes whose creation has been confirmed.
///
/// A node's entry only exists after the backend published it, so a lookup
/// never observes a half-created resource.
#[derive(Debug, Clone, Default)]
pub struct OutputStore {
    nodes: HashMap<NodeId, BTreeMap<String, String>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the attributes of a node. Publishing twice replaces the entry.
    pub fn publish<I>(&mut self, node: impl Into<NodeId>, attributes: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.nodes
            .insert(node.into(), attributes.into_iter().collect());
    }

    pub fn is_published(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn attributes(&self, node: &str) -> Option<&BTreeMap<String, String>> {
        self.nodes.get(node)
    }

    pub fn get(&self, r: &OutputRef) -> Option<&str> {
        self.nodes
            .get(&r.node)
            .and_then(|attrs| attrs.get(&r.attribute))
            .map(String::as_str)
    }
}
