// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces:
//! - an updated scheduler state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from a channel,
//! hands nodes to the executor backend and handles shutdown. The core itself
//! has no channels and performs no IO, so it is unit tested directly.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_node_completion, handle_node_started, start_apply, CoreStep,
};
use crate::engine::report::ApplyReport;
use crate::engine::RuntimeEvent;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    interrupted: bool,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            interrupted: false,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Start the apply and return the initial dispatch.
    pub fn start(&mut self) -> CoreStep {
        start_apply(&mut self.scheduler)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::NodeStarted { node, at } => {
                handle_node_started(&mut self.scheduler, &node, at)
            }
            RuntimeEvent::NodeCompleted { node, outcome, at } => {
                handle_node_completion(&mut self.scheduler, &node, outcome, at)
            }
            RuntimeEvent::ShutdownRequested => {
                self.interrupted = true;
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }

    /// Snapshot of the apply so far.
    pub fn report(&self) -> ApplyReport {
        ApplyReport::from_scheduler(&self.scheduler, self.interrupted)
    }
}
