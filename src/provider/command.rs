// src/provider/command.rs

//! Provider backed by an external helper program.
//!
//! The helper is invoked as `<program> [args..] create` or
//! `<program> [args..] candidates`, receives the JSON-encoded request on stdin
//! and answers with JSON on stdout. A non-zero exit is a failed call; stderr
//! becomes the error message.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ProviderError;
use crate::provider::{Candidate, CandidateFilter, CreateRequest, CreatedResource, Provider};

#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a configured command line (`"oci-helper --profile x"`) on whitespace.
    pub fn from_command_line(line: &str) -> Result<Self, ProviderError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ProviderError::CommandFailed("empty provider command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(operation)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, operation, "invoking provider helper");

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // A helper that exits without reading stdin is judged by its exit status.
            if let Err(e) = stdin.write_all(&body).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::CommandFailed(format!(
                "{} {} exited with {}: {}",
                self.program,
                operation,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} {} produced no output",
                self.program, operation
            )));
        }
        Ok(serde_json::from_str(stdout.trim())?)
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn name(&self) -> &str {
        "command"
    }

    async fn create_resource(&self, request: &CreateRequest) -> Result<CreatedResource, ProviderError> {
        let created: CreatedResource = self.call("create", request).await?;
        if created.id.is_empty() {
            return Err(ProviderError::CreationFailed(format!(
                "provider confirmed '{}' without an id",
                request.name
            )));
        }
        info!(resource = %request.name, kind = %request.kind, id = %created.id, "provider created resource");
        Ok(created)
    }

    async fn list_availability_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Candidate>, ProviderError> {
        self.call("candidates", filter).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn parses_json_answer_from_helper() {
        // `sh -c <script> create`: the operation lands in $0.
        let provider = CommandProvider {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"cat > /dev/null; echo '{"id":"ocid1.vcn","outputs":{"cidr":"10.0.0.0/16"}}'"#
                    .to_string(),
            ],
        };
        let created = provider
            .create_resource(&CreateRequest {
                name: "vcn".into(),
                kind: "oci:core/Vcn".into(),
                config: json!({"cidrBlocks": ["10.0.0.0/16"]}),
                delete_before_replace: false,
            })
            .await
            .unwrap();

        assert_eq!(created.id, "ocid1.vcn");
        assert_eq!(created.outputs.get("cidr").map(String::as_str), Some("10.0.0.0/16"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_command_failure() {
        let provider = CommandProvider {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "cat > /dev/null; echo quota exceeded >&2; exit 3".to_string()],
        };
        let err = provider
            .list_availability_candidates(&CandidateFilter {
                compartment_id: "c".into(),
                name_pattern: "AD-1".into(),
            })
            .await
            .unwrap_err();

        match err {
            ProviderError::CommandFailed(msg) => assert!(msg.contains("quota exceeded"), "{msg}"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let p = CommandProvider::from_command_line("oci-helper --profile dev").unwrap();
        assert_eq!(p.program(), "oci-helper");
        assert_eq!(p.args, vec!["--profile".to_string(), "dev".to_string()]);
        assert!(CommandProvider::from_command_line("   ").is_err());
    }
}
