// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::ScheduledNode;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::report::ApplyReport;
use super::{CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates node
/// execution to an `ExecutorBackend`.
///
/// All apply semantics live in `CoreRuntime`; this struct only moves events
/// from the channel into the core and commands from the core to the backend.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Run the apply to completion (or until shutdown) and return the report.
    ///
    /// Node failures are part of the report, not an `Err`; errors are reserved
    /// for the runtime itself (e.g. the backend could not dispatch).
    pub async fn run(mut self) -> Result<ApplyReport> {
        info!("cloudstep runtime started");

        let initial = self.core.start();
        let mut keep_running = initial.keep_running;
        for command in initial.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!("runtime event channel closed before the apply finished");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                keep_running = false;
            }
        }

        let report = self.core.report();
        info!(
            succeeded = report.succeeded(),
            interrupted = report.interrupted,
            "runtime exiting"
        );
        Ok(report)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchNodes(nodes) => self.dispatch(nodes).await,
            CoreCommand::Finish => {
                info!("every node is terminal");
                Ok(())
            }
        }
    }

    async fn dispatch(&mut self, nodes: Vec<ScheduledNode>) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        debug!(?ids, "dispatching ready nodes");

        self.executor.spawn_ready_nodes(nodes).await
    }
}
