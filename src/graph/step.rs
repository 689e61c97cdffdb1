// src/graph/step.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ExecutionError;
use crate::graph::input::{Input, NodeId, OutputRef};
use crate::graph::outputs::OutputStore;
use crate::script::ScriptPayload;

/// Timeout applied when a step does not declare one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How the executor authenticates against a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Private key file passed to the transport (`ssh -i`).
    KeyFile(PathBuf),
    /// Whatever the local agent / transport defaults provide.
    Agent,
}

/// Connection descriptor for a remote step.
///
/// The host is usually an output of the compute instance, so it stays an
/// [`Input`] until the step is dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub host: Input,
    pub user: String,
    pub credential: Credential,
}

impl Target {
    pub fn new(host: impl Into<Input>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            credential,
        }
    }

    pub fn resolve(&self, outputs: &OutputStore) -> Result<ResolvedTarget, ExecutionError> {
        Ok(ResolvedTarget {
            host: self.host.resolve_string(outputs)?,
            user: self.user.clone(),
            credential: self.credential.clone(),
        })
    }
}

/// A target whose host is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub host: String,
    pub user: String,
    pub credential: Credential,
}

impl ResolvedTarget {
    /// `user@host`, also the key for per-target serialization.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// What a step runs on its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCommand {
    /// A literal shell command line.
    Shell(String),
    /// Write a payload to `remote_path` on the target (payload travels on stdin).
    Deliver {
        remote_path: String,
        payload: ScriptPayload,
    },
}

impl StepCommand {
    pub fn shell(cmd: impl Into<String>) -> Self {
        StepCommand::Shell(cmd.into())
    }

    /// Command line plus optional stdin, as handed to the executor.
    pub fn resolve(&self) -> ResolvedCommand {
        match self {
            StepCommand::Shell(cmd) => ResolvedCommand {
                command: cmd.clone(),
                stdin: None,
            },
            StepCommand::Deliver {
                remote_path,
                payload,
            } => ResolvedCommand {
                command: format!("cat > {}", shell_quote(remote_path)),
                stdin: Some(payload.text().to_string()),
            },
        }
    }

    /// Short human-readable form for logs and dry-run output.
    pub fn describe(&self) -> String {
        match self {
            StepCommand::Shell(cmd) => cmd.clone(),
            StepCommand::Deliver {
                remote_path,
                payload,
            } => format!("deliver {} -> {}", payload.name(), remote_path),
        }
    }
}

/// Fully resolved command for one execution.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command: String,
    pub stdin: Option<String>,
}

impl ResolvedCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: None,
        }
    }
}

impl fmt::Debug for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCommand")
            .field("command", &self.command)
            .field("stdin_len", &self.stdin.as_ref().map(String::len))
            .finish()
    }
}

/// One entry of a step's trigger list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerInput {
    Value(String),
    Output(OutputRef),
}

impl TriggerInput {
    pub fn resolve(&self, outputs: &OutputStore) -> Result<String, ExecutionError> {
        match self {
            TriggerInput::Value(v) => Ok(v.clone()),
            TriggerInput::Output(r) => r.resolve(outputs).map(str::to_string),
        }
    }
}

impl From<&str> for TriggerInput {
    fn from(s: &str) -> Self {
        TriggerInput::Value(s.to_string())
    }
}

impl From<String> for TriggerInput {
    fn from(s: String) -> Self {
        TriggerInput::Value(s)
    }
}

impl From<OutputRef> for TriggerInput {
    fn from(r: OutputRef) -> Self {
        TriggerInput::Output(r)
    }
}

/// An imperative command executed against a provisioned target.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStep {
    pub id: NodeId,
    pub target: Target,
    pub command: StepCommand,
    pub triggers: Vec<TriggerInput>,
    pub timeout: Duration,
    /// Keep redialling a refused or unreachable target until the timeout
    /// runs out, instead of failing on the first connection error.
    pub retry_connection: bool,
}

impl RemoteStep {
    pub fn new(id: impl Into<NodeId>, target: Target, command: StepCommand) -> Self {
        Self {
            id: id.into(),
            target,
            command,
            triggers: Vec::new(),
            timeout: DEFAULT_STEP_TIMEOUT,
            retry_connection: false,
        }
    }

    pub fn trigger(mut self, input: impl Into<TriggerInput>) -> Self {
        self.triggers.push(input.into());
        self
    }

    pub fn retry_connection(mut self, retry: bool) -> Self {
        self.retry_connection = retry;
        self
    }

    pub fn triggers<I, T>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TriggerInput>,
    {
        self.triggers.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Output references consumed by the target and the trigger list.
    pub fn output_refs(&self) -> Vec<&OutputRef> {
        let mut refs = self.target.host.output_refs();
        refs.extend(self.triggers.iter().filter_map(|t| match t {
            TriggerInput::Output(r) => Some(r),
            TriggerInput::Value(_) => None,
        }));
        refs
    }

    /// Values the trigger fingerprint is computed over: the resolved trigger
    /// list followed by the command material, so every step is content-addressed.
    pub fn fingerprint_inputs(&self, outputs: &OutputStore) -> Result<Vec<String>, ExecutionError> {
        let mut inputs = self
            .triggers
            .iter()
            .map(|t| t.resolve(outputs))
            .collect::<Result<Vec<_>, _>>()?;

        let resolved = self.command.resolve();
        inputs.push(resolved.command);
        if let Some(stdin) = resolved.stdin {
            inputs.push(stdin);
        }
        Ok(inputs)
    }
}

/// Single-quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new(OutputRef::new("instance", "public_ip"), "opc", Credential::Agent)
    }

    #[test]
    fn deliver_sends_payload_on_stdin() {
        let cmd = StepCommand::Deliver {
            remote_path: "/tmp/volume-mount.sh".into(),
            payload: ScriptPayload::new("volume-mount.sh", "mkfs ..."),
        };
        let resolved = cmd.resolve();
        assert_eq!(resolved.command, "cat > /tmp/volume-mount.sh");
        assert_eq!(resolved.stdin.as_deref(), Some("mkfs ..."));
    }

    #[test]
    fn shell_quote_escapes_only_when_needed() {
        assert_eq!(shell_quote("/tmp/a-b.sh"), "/tmp/a-b.sh");
        assert_eq!(shell_quote("it's here"), r"'it'\''s here'");
    }

    #[test]
    fn fingerprint_inputs_include_command_material() {
        let mut outputs = OutputStore::new();
        outputs.publish(
            "instance",
            [
                ("id".to_string(), "i-1".to_string()),
                ("public_ip".to_string(), "203.0.113.7".to_string()),
            ],
        );
        let step = RemoteStep::new("await", target(), StepCommand::shell("sudo cloud-init status --wait"))
            .trigger(OutputRef::new("instance", "id"));

        assert_eq!(
            step.fingerprint_inputs(&outputs).unwrap(),
            vec!["i-1".to_string(), "sudo cloud-init status --wait".to_string()]
        );
        assert_eq!(step.output_refs().len(), 2);
    }
}
