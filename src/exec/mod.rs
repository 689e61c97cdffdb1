// src/exec/mod.rs

//! Execution layer.
//!
//! This module runs dispatched nodes and reports back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`session`] defines the remote connection capability
//!   ([`RemoteConnector`] / [`Session`]).
//! - [`ssh`] implements it on top of the system `ssh` client.
//! - [`executor`] runs one remote step with its timeout and per-target
//!   serialization.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `ProvisionBackend` that the runtime uses in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod executor;
pub mod session;
pub mod ssh;

pub use backend::{ExecutorBackend, ProvisionBackend};
pub use executor::{StepExecutor, StepOutput};
pub use session::{CommandOutput, RemoteConnector, Session};
pub use ssh::SshConnector;
