// src/dag/node_info.rs

//! Per-node apply state.

use tokio::time::Instant;

use crate::graph::{Node, NodeId, NodeKind};

/// State of a node during one apply.
///
/// `Pending → Ready → Running → {Succeeded | Failed | TimedOut}` and
/// `Pending → Blocked` when an upstream node did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Waiting for dependencies.
    Pending,
    /// Every dependency succeeded; handed to the executor, waiting for a slot.
    Ready,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    /// Never started because a transitive dependency failed or timed out.
    Blocked,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::TimedOut | RunState::Blocked
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Ready => "ready",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::TimedOut => "timed_out",
            RunState::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static node information from the graph plus its apply state.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub label: &'static str,
    /// Direct dependencies.
    pub deps: Vec<NodeId>,
    pub run_state: RunState,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    /// False when a remote step was skipped because its triggers were unchanged.
    pub executed: bool,
    pub error: Option<String>,
}

impl NodeInfo {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label(),
            deps: node.deps.clone(),
            run_state: RunState::Pending,
            started_at: None,
            completed_at: None,
            executed: false,
            error: None,
        }
    }

    /// Forget everything about a previous apply.
    pub fn reset(&mut self) {
        self.run_state = RunState::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.executed = false;
        self.error = None;
    }
}

/// A node the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledNode {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl ScheduledNode {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
        }
    }
}
