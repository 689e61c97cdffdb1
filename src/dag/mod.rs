// src/dag/mod.rs

//! Apply scheduling over the provisioning graph.
//!
//! - [`scheduler`] contains the per-apply state machine that decides which
//!   nodes are ready, and which are blocked by an upstream failure.
//! - [`node_info`] provides per-node state and the scheduled node type.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages the state transitions.

pub mod node_info;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use node_info::{NodeInfo, RunState, ScheduledNode};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
