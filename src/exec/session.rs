// src/exec/session.rs

//! Remote connection capability.

use async_trait::async_trait;

use crate::errors::ExecutionError;
use crate::graph::{ResolvedCommand, ResolvedTarget};

/// Exit status and combined stdout/stderr of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opens sessions against resolved targets.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, target: &ResolvedTarget) -> Result<Box<dyn Session>, ExecutionError>;
}

/// A session able to run commands on one target.
///
/// Dropping the future returned by [`Session::run`] must stop the command
/// locally; the executor relies on this to enforce timeouts.
#[async_trait]
pub trait Session: Send {
    async fn run(&mut self, command: &ResolvedCommand) -> Result<CommandOutput, ExecutionError>;
}
