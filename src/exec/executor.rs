// src/exec/executor.rs

//! Runs a single remote step against its target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::ExecutionError;
use crate::exec::session::{CommandOutput, RemoteConnector};
use crate::graph::{RemoteStep, ResolvedCommand, ResolvedTarget};

/// First pause between connection attempts; doubles up to [`MAX_RETRY_BACKOFF`].
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// Result of a successful step execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub exit_code: i32,
    pub output: String,
    pub elapsed: Duration,
}

/// Executes resolved commands through a [`RemoteConnector`].
///
/// Steps against the same `user@host` are serialized; the wait for that lock
/// does not count against the step timeout.
#[derive(Clone)]
pub struct StepExecutor {
    connector: Arc<dyn RemoteConnector>,
    target_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl StepExecutor {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            target_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, destination: &str) -> Result<Arc<tokio::sync::Mutex<()>>, ExecutionError> {
        let mut locks = self
            .target_locks
            .lock()
            .map_err(|_| ExecutionError::Local("target lock table poisoned".to_string()))?;
        Ok(locks
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Connect, run `command` and classify the result.
    ///
    /// - the whole connect + run sequence is bounded by `step.timeout`; on
    ///   expiry the in-flight future is dropped (which kills the local
    ///   transport process) and [`ExecutionError::Timeout`] is returned
    /// - a non-zero exit becomes [`ExecutionError::NonZeroExit`] carrying the
    ///   command output
    /// - with [`RemoteStep::retry_connection`] set, connection errors are
    ///   retried with backoff until the timeout runs out
    pub async fn execute(
        &self,
        step: &RemoteStep,
        target: &ResolvedTarget,
        command: ResolvedCommand,
    ) -> Result<StepOutput, ExecutionError> {
        let destination = target.destination();
        let lock = self.lock_for(&destination)?;
        let _guard = lock.lock().await;

        info!(
            step = %step.id,
            target = %destination,
            cmd = %command.command,
            timeout = ?step.timeout,
            "executing remote step"
        );

        let started = Instant::now();
        let attempts = self.run_with_retries(step, target, &command);

        let output = match tokio::time::timeout(step.timeout, attempts).await {
            Ok(res) => res?,
            Err(_) => {
                warn!(step = %step.id, timeout = ?step.timeout, "remote step timed out");
                return Err(ExecutionError::Timeout {
                    step: step.id.clone(),
                    timeout: step.timeout,
                });
            }
        };

        let elapsed = started.elapsed();
        if !output.success() {
            warn!(
                step = %step.id,
                exit_code = output.exit_code,
                "remote step exited with non-zero status"
            );
            return Err(ExecutionError::NonZeroExit {
                step: step.id.clone(),
                code: output.exit_code,
                output: output.output,
            });
        }

        debug!(step = %step.id, ?elapsed, "remote step succeeded");
        Ok(StepOutput {
            exit_code: output.exit_code,
            output: output.output,
            elapsed,
        })
    }

    async fn run_with_retries(
        &self,
        step: &RemoteStep,
        target: &ResolvedTarget,
        command: &ResolvedCommand,
    ) -> Result<CommandOutput, ExecutionError> {
        let mut backoff = INITIAL_RETRY_BACKOFF;
        let mut attempt = 1u32;
        loop {
            let result = match self.connector.connect(target).await {
                Ok(mut session) => session.run(command).await,
                Err(e) => Err(e),
            };

            match result {
                Err(ExecutionError::Connection { host, message }) if step.retry_connection => {
                    debug!(
                        step = %step.id,
                        host = %host,
                        attempt,
                        error = %message,
                        retry_in = ?backoff,
                        "target not reachable yet; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor").finish_non_exhaustive()
    }
}
