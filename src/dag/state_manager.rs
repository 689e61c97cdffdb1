// src/dag/state_manager.rs

//! Apply state transitions for nodes in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::node_info::{NodeInfo, RunState, ScheduledNode};
use crate::graph::{NodeId, ProvisionGraph};

/// Mutating view over the per-node state of one apply.
pub struct StateManager<'a> {
    graph: &'a ProvisionGraph,
    nodes: &'a mut HashMap<NodeId, NodeInfo>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a ProvisionGraph, nodes: &'a mut HashMap<NodeId, NodeInfo>) -> Self {
        Self { graph, nodes }
    }

    pub fn deps_satisfied_for_info(&self, info: &NodeInfo) -> bool {
        ReadOnlyStateManager::new(self.nodes).deps_satisfied_for_info(info)
    }

    /// Mark every transitive dependent of `failed` that has not started yet
    /// as `Blocked`.
    ///
    /// Returns the newly blocked nodes (excluding `failed` itself).
    pub fn mark_dependents_blocked(&mut self, failed: &str) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_blocked = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(info) = self.nodes.get_mut(&id) else {
                warn!(node = %id, "node in graph not present in state map");
                continue;
            };

            match info.run_state {
                RunState::Pending => {
                    info.run_state = RunState::Blocked;
                    info.error = Some(format!("blocked by upstream failure of '{}'", failed));
                    debug!(node = %info.id, upstream = %failed, "marking dependent as Blocked");
                    newly_blocked.push(info.id.clone());
                    stack.extend(self.graph.dependents_of(&id).iter().cloned());
                }
                RunState::Ready | RunState::Running => {
                    // Cannot happen: a node only leaves Pending once every dependency succeeded.
                    warn!(node = %info.id, state = %info.run_state, "dependent of a failed node already dispatched");
                }
                RunState::Succeeded | RunState::Failed | RunState::TimedOut | RunState::Blocked => {}
            }
        }

        newly_blocked
    }

    /// Move every `Pending` node whose dependencies all succeeded to `Ready`
    /// and return them, in topological order.
    pub fn collect_new_ready_nodes(&mut self) -> Vec<ScheduledNode> {
        let candidates: Vec<NodeId> = self
            .graph
            .topological_order()
            .iter()
            .filter(|id| {
                self.nodes.get(id.as_str()).is_some_and(|info| {
                    info.run_state == RunState::Pending && self.deps_satisfied_for_info(info)
                })
            })
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for id in candidates {
            let (Some(info), Some(node)) = (self.nodes.get_mut(&id), self.graph.node(&id)) else {
                continue;
            };
            info!(node = %info.id, kind = info.label, "dependencies satisfied; node ready");
            info.run_state = RunState::Ready;
            ready.push(ScheduledNode::from_node(node));
        }

        ready
    }

    pub fn all_nodes_terminal(&self) -> bool {
        self.nodes.values().all(|info| info.run_state.is_terminal())
    }
}

/// Read-only counterpart used where only shared access to the state map exists.
pub struct ReadOnlyStateManager<'a> {
    nodes: &'a HashMap<NodeId, NodeInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(nodes: &'a HashMap<NodeId, NodeInfo>) -> Self {
        Self { nodes }
    }

    /// A node may start only once every direct dependency has `Succeeded`.
    pub fn deps_satisfied_for_info(&self, info: &NodeInfo) -> bool {
        info.deps.iter().all(|dep| match self.nodes.get(dep) {
            Some(d) => d.run_state == RunState::Succeeded,
            None => {
                warn!(node = %info.id, dep = %dep, "dependency missing from state map");
                false
            }
        })
    }
}
