// src/errors.rs

//! Crate-wide error types.
//!
//! - [`CloudstepError`] covers everything that aborts an apply before or
//!   around execution (configuration, graph integrity, IO).
//! - [`ExecutionError`] is the per-step taxonomy reported by the remote
//!   executor. It never aborts the whole apply; the scheduler records it
//!   against the failing node and blocks its dependents.
//! - [`ProviderError`] is what the cloud provider capability reports.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudstepError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<String>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Graph integrity error: {0}")]
    GraphIntegrity(String),

    #[error("Unresolved placeholders in {script}: {}", .names.join(", "))]
    UnresolvedPlaceholders { script: String, names: Vec<String> },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Apply failed: {0}")]
    ApplyFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single remote step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("cannot reach {host}: {message}")]
    Connection { host: String, message: String },

    #[error("step '{step}' exceeded its timeout of {timeout:?}")]
    Timeout { step: String, timeout: Duration },

    #[error("step '{step}' exited with code {code}")]
    NonZeroExit {
        step: String,
        code: i32,
        output: String,
    },

    #[error("input not available yet: {0}")]
    Unresolved(String),

    #[error("{0}")]
    Local(String),
}

impl ExecutionError {
    /// Whether this failure should be reported as `TimedOut` rather than `Failed`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider command failed: {0}")]
    CommandFailed(String),

    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("resource creation failed: {0}")]
    CreationFailed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CloudstepError>;
