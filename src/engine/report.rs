// src/engine/report.rs

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::dag::{RunState, Scheduler};
use crate::graph::NodeId;

/// Final state of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub id: NodeId,
    pub kind: &'static str,
    pub state: RunState,
    /// False for remote steps skipped because their triggers were unchanged.
    pub executed: bool,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub error: Option<String>,
}

impl NodeReport {
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(s), Some(c)) => Some(c.saturating_duration_since(s)),
            _ => None,
        }
    }
}

/// What an apply returns: every node in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub nodes: Vec<NodeReport>,
    /// Set when a shutdown request stopped the apply early.
    pub interrupted: bool,
}

impl ApplyReport {
    pub fn from_scheduler(scheduler: &Scheduler, interrupted: bool) -> Self {
        let nodes = scheduler
            .node_infos()
            .map(|info| NodeReport {
                id: info.id.clone(),
                kind: info.label,
                state: info.run_state,
                executed: info.executed,
                started_at: info.started_at,
                completed_at: info.completed_at,
                error: info.error.clone(),
            })
            .collect();

        Self { nodes, interrupted }
    }

    pub fn node(&self, id: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn state_of(&self, id: &str) -> Option<RunState> {
        self.node(id).map(|n| n.state)
    }

    /// The apply succeeded only if every node succeeded.
    pub fn succeeded(&self) -> bool {
        !self.interrupted && self.nodes.iter().all(|n| n.state == RunState::Succeeded)
    }

    /// Nodes that failed or timed out (blocked dependents excluded).
    pub fn failures(&self) -> Vec<&NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.state, RunState::Failed | RunState::TimedOut))
            .collect()
    }

    pub fn count(&self, state: RunState) -> usize {
        self.nodes.iter().filter(|n| n.state == state).count()
    }

    /// Remote steps that actually ran in this apply.
    pub fn executed_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state == RunState::Succeeded && n.executed)
            .count()
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.nodes.iter().map(|n| n.id.len()).max().unwrap_or(0);
        for n in &self.nodes {
            let note = match (&n.error, n.state, n.executed) {
                (Some(err), _, _) => format!("  {err}"),
                (None, RunState::Succeeded, false) => "  (unchanged)".to_string(),
                _ => String::new(),
            };
            let elapsed = n
                .elapsed()
                .map(|d| format!(" {:.1}s", d.as_secs_f64()))
                .unwrap_or_default();
            writeln!(
                f,
                "  {:<width$}  {:<8}  {:<9}{}{}",
                n.id,
                n.kind,
                n.state.as_str(),
                elapsed,
                note,
                width = width
            )?;
        }
        write!(
            f,
            "{} succeeded ({} executed), {} failed, {} timed out, {} blocked{}",
            self.count(RunState::Succeeded),
            self.executed_count(),
            self.count(RunState::Failed),
            self.count(RunState::TimedOut),
            self.count(RunState::Blocked),
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}
