// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::dag::node_info::ScheduledNode;
use crate::graph::NodeId;

/// Structured result of a single scheduler "step".
///
/// Tests use it to drive the graph manually and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes that became `Ready` as a result of this step.
    pub newly_ready: Vec<ScheduledNode>,
    /// Nodes newly marked `Blocked` by an upstream failure in this step.
    pub newly_blocked: Vec<NodeId>,
    /// Whether this step left every node in a terminal state.
    pub apply_finished: bool,
}
