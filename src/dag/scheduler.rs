// src/dag/scheduler.rs

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::node_info::{NodeInfo, RunState};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::engine::NodeOutcome;
use crate::graph::{NodeId, ProvisionGraph};

/// Scheduler holds the immutable provisioning graph plus mutable apply state.
///
/// It is responsible for:
/// - deciding when a node is ready (every dependency succeeded)
/// - recording start / completion instants and outcomes
/// - blocking the transitive dependents of a node that failed or timed out
///
/// It never performs IO; the engine feeds it events and dispatches what it
/// returns.
#[derive(Debug)]
pub struct Scheduler {
    graph: ProvisionGraph,
    nodes: HashMap<NodeId, NodeInfo>,
    started: bool,
}

impl Scheduler {
    pub fn from_graph(graph: &ProvisionGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| (n.id.clone(), NodeInfo::from_node(n)))
            .collect();

        Self {
            graph: graph.clone(),
            nodes,
            started: false,
        }
    }

    pub fn graph(&self) -> &ProvisionGraph {
        &self.graph
    }

    /// Read-only view of a node's state; `None` for unknown ids.
    pub fn run_state_of(&self, node: &str) -> Option<RunState> {
        self.nodes.get(node).map(|info| info.run_state)
    }

    pub fn node_info(&self, node: &str) -> Option<&NodeInfo> {
        self.nodes.get(node)
    }

    /// Per-node state in declaration order.
    pub fn node_infos(&self) -> impl Iterator<Item = &NodeInfo> {
        self.graph.node_ids().filter_map(|id| self.nodes.get(id))
    }

    /// Whether every dependency of `node` has succeeded. `None` for unknown ids.
    pub fn deps_satisfied(&self, node: &str) -> Option<bool> {
        let info = self.nodes.get(node)?;
        Some(ReadOnlyStateManager::new(&self.nodes).deps_satisfied_for_info(info))
    }

    /// True once the apply started and every node is terminal.
    pub fn is_finished(&self) -> bool {
        self.started && self.nodes.values().all(|info| info.run_state.is_terminal())
    }

    /// Begin an apply: every node goes back to `Pending` and the roots become `Ready`.
    pub fn start_apply(&mut self) -> SchedulerStep {
        for info in self.nodes.values_mut() {
            info.reset();
        }
        self.started = true;
        debug!(nodes = self.nodes.len(), "scheduler: starting apply");

        let mut manager = StateManager::new(&self.graph, &mut self.nodes);
        let newly_ready = manager.collect_new_ready_nodes();
        let apply_finished = manager.all_nodes_terminal();

        SchedulerStep {
            newly_ready,
            newly_blocked: Vec::new(),
            apply_finished,
        }
    }

    /// The executor picked the node up (`Ready → Running`).
    pub fn handle_started(&mut self, node: &str, at: Instant) {
        match self.nodes.get_mut(node) {
            Some(info) if info.run_state == RunState::Ready => {
                info.run_state = RunState::Running;
                info.started_at = Some(at);
                debug!(node = %info.id, "node running");
            }
            Some(info) => {
                warn!(node = %info.id, state = %info.run_state, "start reported for node that is not Ready; ignoring");
            }
            None => warn!(node = %node, "start reported for unknown node; ignoring"),
        }
    }

    /// Record a node's outcome and return what changed.
    pub fn handle_completion(&mut self, node: &str, outcome: NodeOutcome, at: Instant) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(info) = self.nodes.get_mut(node) else {
            warn!(node = %node, "completion for unknown node; ignoring");
            return step;
        };

        if !matches!(info.run_state, RunState::Ready | RunState::Running) {
            warn!(node = %info.id, state = %info.run_state, "completion for node that is not in flight; ignoring");
            return step;
        }

        let outcome_is_timeout = matches!(outcome, NodeOutcome::TimedOut(_));
        if info.started_at.is_none() {
            info.started_at = Some(at);
        }
        info.completed_at = Some(at);

        match outcome {
            NodeOutcome::Succeeded { executed } => {
                info.run_state = RunState::Succeeded;
                info.executed = executed;
                info!(node = %info.id, executed, "node succeeded");

                let mut manager = StateManager::new(&self.graph, &mut self.nodes);
                step.newly_ready = manager.collect_new_ready_nodes();
            }
            NodeOutcome::Failed(message) | NodeOutcome::TimedOut(message) => {
                info.run_state = if outcome_is_timeout {
                    RunState::TimedOut
                } else {
                    RunState::Failed
                };
                warn!(
                    node = %info.id,
                    state = %info.run_state,
                    error = %message,
                    "node did not succeed; blocking dependents"
                );
                info.error = Some(message);

                let mut manager = StateManager::new(&self.graph, &mut self.nodes);
                step.newly_blocked = manager.mark_dependents_blocked(node);
            }
        }

        step.apply_finished = self.is_finished();
        if step.apply_finished {
            info!("scheduler: every node terminal; apply finished");
        }
        step
    }
}
