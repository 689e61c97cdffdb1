// src/exec/ssh.rs

//! [`RemoteConnector`] backed by the system `ssh` binary.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ExecutionError;
use crate::exec::session::{CommandOutput, RemoteConnector, Session};
use crate::graph::{Credential, ResolvedCommand, ResolvedTarget};

/// `ssh` reserves this exit status for its own errors (unreachable host,
/// authentication failure, ...).
const SSH_ERROR_EXIT: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshConnector {
    program: String,
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout,
        }
    }

    /// Use a different client binary (e.g. a wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(&self, target: &ResolvedTarget) -> Result<Box<dyn Session>, ExecutionError> {
        if target.host.trim().is_empty() {
            return Err(ExecutionError::Connection {
                host: target.host.clone(),
                message: "empty host".to_string(),
            });
        }
        // Every command opens its own ssh connection; failures surface from `run`.
        Ok(Box::new(SshSession {
            program: self.program.clone(),
            connect_timeout: self.connect_timeout,
            target: target.clone(),
        }))
    }
}

struct SshSession {
    program: String,
    connect_timeout: Duration,
    target: ResolvedTarget,
}

impl SshSession {
    fn command(&self, remote: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.connect_timeout.as_secs().max(1)
            ));
        if let Credential::KeyFile(path) = &self.target.credential {
            cmd.arg("-i").arg(path);
        }
        cmd.arg(self.target.destination()).arg(remote);
        cmd
    }
}

#[async_trait]
impl Session for SshSession {
    async fn run(&mut self, command: &ResolvedCommand) -> Result<CommandOutput, ExecutionError> {
        let mut cmd = self.command(&command.command);
        cmd.stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        debug!(target = %self.target.destination(), cmd = %command.command, "spawning ssh");

        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::Local(format!("spawning {}: {}", self.program, e))
        })?;

        if let (Some(payload), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin.write_all(payload.as_bytes()).await.map_err(|e| {
                ExecutionError::Connection {
                    host: self.target.host.clone(),
                    message: format!("writing payload: {e}"),
                }
            })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecutionError::Local(format!("waiting for {}: {}", self.program, e)))?;

        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if code == SSH_ERROR_EXIT {
            return Err(ExecutionError::Connection {
                host: self.target.host.clone(),
                message: stderr.trim().to_string(),
            });
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&stderr);

        info!(target = %self.target.destination(), exit_code = code, "remote command exited");
        Ok(CommandOutput::new(code, combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(credential: Credential) -> SshSession {
        SshSession {
            program: "ssh".to_string(),
            connect_timeout: Duration::from_secs(10),
            target: ResolvedTarget {
                host: "203.0.113.7".to_string(),
                user: "opc".to_string(),
                credential,
            },
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn key_file_is_passed_before_destination() {
        let s = session(Credential::KeyFile(PathBuf::from("/home/me/.ssh/id_ed25519")));
        let a = args(&s.command("sudo cloud-init status --wait"));
        assert_eq!(
            &a[a.len() - 4..],
            &[
                "-i".to_string(),
                "/home/me/.ssh/id_ed25519".to_string(),
                "opc@203.0.113.7".to_string(),
                "sudo cloud-init status --wait".to_string()
            ]
        );
        assert!(a.contains(&"BatchMode=yes".to_string()));
        assert!(a.contains(&"ConnectTimeout=10".to_string()));
    }

    #[test]
    fn agent_credential_adds_no_identity() {
        let a = args(&session(Credential::Agent).command("true"));
        assert!(!a.contains(&"-i".to_string()));
    }

    #[cfg(unix)]
    fn fake_client(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-ssh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_255_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_client(dir.path(), "echo 'Connection refused' >&2; exit 255");
        let connector = SshConnector::default().with_program(program);
        let target = session(Credential::Agent).target;

        let mut s = connector.connect(&target).await.unwrap();
        match s.run(&ResolvedCommand::new("true")).await {
            Err(ExecutionError::Connection { host, message }) => {
                assert_eq!(host, "203.0.113.7");
                assert!(message.contains("Connection refused"));
            }
            other => panic!("expected Connection, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn remote_exit_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_client(dir.path(), "cat; echo done; exit 3");
        let connector = SshConnector::default().with_program(program);
        let target = session(Credential::Agent).target;

        let mut s = connector.connect(&target).await.unwrap();
        let mut cmd = ResolvedCommand::new("cat > /tmp/x.sh");
        cmd.stdin = Some("payload\n".to_string());
        let out = s.run(&cmd).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.output, "payload\ndone\n");
    }
}
