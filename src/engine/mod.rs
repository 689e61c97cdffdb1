// src/engine/mod.rs

//! Orchestration engine for cloudstep.
//!
//! This module ties together:
//! - the apply scheduler
//! - the main runtime event loop that reacts to:
//!   - nodes picked up by the executor
//!   - node completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`report`] is what an apply returns.

use tokio::time::Instant;

use crate::graph::NodeId;

/// Outcome of one node for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// `executed` is false when a remote step was skipped because its
    /// trigger fingerprint was unchanged.
    Succeeded { executed: bool },
    Failed(String),
    TimedOut(String),
}

/// Events flowing into the runtime from the executor backend and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The executor acquired a slot and began working on the node.
    NodeStarted { node: NodeId, at: Instant },
    /// The node reached a terminal outcome.
    NodeCompleted {
        node: NodeId,
        outcome: NodeOutcome,
        at: Instant,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::{ApplyReport, NodeReport};
pub use runtime::Runtime;
