// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::dag::{ScheduledNode, Scheduler};
use crate::engine::NodeOutcome;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these nodes to the executor backend.
    DispatchNodes(Vec<ScheduledNode>),
    /// Every node is terminal; the apply is over.
    Finish,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn from_parts(ready: Vec<ScheduledNode>, finished: bool) -> Self {
        let mut commands = Vec::new();
        if !ready.is_empty() {
            commands.push(CoreCommand::DispatchNodes(ready));
        }
        if finished {
            commands.push(CoreCommand::Finish);
        }
        CoreStep {
            commands,
            keep_running: !finished,
        }
    }
}

/// Seed the apply: every root is dispatched at once.
pub fn start_apply(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start_apply();
    info!(roots = step.newly_ready.len(), "apply started");
    CoreStep::from_parts(step.newly_ready, step.apply_finished)
}

pub fn handle_node_started(scheduler: &mut Scheduler, node: &str, at: Instant) -> CoreStep {
    scheduler.handle_started(node, at);
    CoreStep {
        commands: Vec::new(),
        keep_running: true,
    }
}

/// Record the outcome, dispatch whatever became ready and finish once every
/// node is terminal.
pub fn handle_node_completion(
    scheduler: &mut Scheduler,
    node: &str,
    outcome: NodeOutcome,
    at: Instant,
) -> CoreStep {
    let step = scheduler.handle_completion(node, outcome, at);
    if !step.newly_blocked.is_empty() {
        debug!(node = %node, blocked = ?step.newly_blocked, "dependents blocked");
    }
    CoreStep::from_parts(step.newly_ready, step.apply_finished)
}
