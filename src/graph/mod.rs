// src/graph/mod.rs

//! Declarative provisioning graph.
//!
//! - [`input`] holds configuration values and references to other nodes'
//!   output attributes.
//! - [`outputs`] is the store those references resolve against once the
//!   owning node has been created.
//! - [`node`] / [`step`] describe resource, lookup and remote-step nodes.
//! - [`builder`] is the declaration API; [`validate`] runs the integrity
//!   checks performed by [`GraphBuilder::build`].
//! - [`provision`] is the validated, immutable graph handed to the scheduler.

pub mod builder;
pub mod input;
pub mod node;
pub mod outputs;
pub mod provision;
pub mod step;
pub mod validate;

pub use builder::{GraphBuilder, ScriptStep};
pub use input::{Input, NodeId, OutputRef, ResourceConfig};
pub use node::{LookupSpec, Node, NodeHandle, NodeKind, ResourceOptions, ResourceSpec};
pub use outputs::OutputStore;
pub use provision::ProvisionGraph;
pub use step::{
    Credential, RemoteStep, ResolvedCommand, ResolvedTarget, StepCommand, Target, TriggerInput,
};
