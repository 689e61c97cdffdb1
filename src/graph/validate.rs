// src/graph/validate.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{CloudstepError, Result};
use crate::graph::input::NodeId;
use crate::graph::node::Node;

/// Run every integrity check over the declared nodes and return a
/// topological order (dependencies first).
///
/// This checks:
/// - every dependency edge targets a declared node, and no node depends on itself
/// - the graph has no cycles
/// - every output a node reads belongs to a node in its dependency closure
pub fn validate_nodes(nodes: &[Node]) -> Result<Vec<NodeId>> {
    validate_dependencies(nodes)?;
    let order = validate_acyclic(nodes)?;
    validate_output_consumption(nodes)?;
    Ok(order)
}

fn validate_dependencies(nodes: &[Node]) -> Result<()> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    for node in nodes {
        for dep in &node.deps {
            if dep == &node.id {
                return Err(CloudstepError::GraphIntegrity(format!(
                    "node '{}' cannot depend on itself",
                    node.id
                )));
            }
            if !known.contains(dep.as_str()) {
                return Err(CloudstepError::GraphIntegrity(format!(
                    "node '{}' has unknown dependency '{}'",
                    node.id, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_acyclic(nodes: &[Node]) -> Result<Vec<NodeId>> {
    // Edge direction: dep -> node, so a topological order lists dependencies first.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for node in nodes {
        graph.add_node(node.id.as_str());
    }

    for node in nodes {
        for dep in &node.deps {
            graph.add_edge(dep.as_str(), node.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(CloudstepError::GraphIntegrity(format!(
            "cycle detected in provisioning graph involving node '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_output_consumption(nodes: &[Node]) -> Result<()> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for node in nodes {
        let consumed = node.consumed_outputs();
        if consumed.is_empty() {
            continue;
        }

        let closure = dependency_closure(node, &by_id);
        for r in consumed {
            if !by_id.contains_key(r.node.as_str()) {
                return Err(CloudstepError::GraphIntegrity(format!(
                    "node '{}' reads output '{}' of unknown node '{}'",
                    node.id, r, r.node
                )));
            }
            if !closure.contains(r.node.as_str()) {
                return Err(CloudstepError::GraphIntegrity(format!(
                    "node '{}' reads output '{}' but does not depend on '{}'",
                    node.id, r, r.node
                )));
            }
        }
    }
    Ok(())
}

/// Transitive dependencies of `node` (the graph is already known to be acyclic).
fn dependency_closure<'a>(node: &'a Node, by_id: &HashMap<&'a str, &'a Node>) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = node.deps.iter().map(String::as_str).collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(dep) = by_id.get(id) {
            stack.extend(dep.deps.iter().map(String::as_str));
        }
    }
    seen
}
