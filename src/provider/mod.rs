// src/provider/mod.rs

//! Cloud provider capability.
//!
//! The engine never talks to a vendor API directly. Resource and lookup nodes
//! go through the [`Provider`] trait; [`command::CommandProvider`] is the
//! production implementation that drives an external helper program, and
//! tests substitute a fake.

pub mod command;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProviderError;

pub use command::CommandProvider;

/// Request to create (or converge) one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Stable node identity, used by the provider as the logical name.
    pub name: String,
    /// Provider type name, e.g. `oci:core/Vcn`.
    pub kind: String,
    /// Resolved configuration (every output reference already substituted).
    pub config: Value,
    #[serde(default)]
    pub delete_before_replace: bool,
}

/// Confirmation returned by the provider once a resource exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreatedResource {
    pub id: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl CreatedResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// All attributes a node publishes: the outputs plus `id`.
    pub fn into_attributes(self) -> BTreeMap<String, String> {
        let mut attrs = self.outputs;
        attrs.insert("id".to_string(), self.id);
        attrs
    }
}

/// Filter for availability-domain candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub compartment_id: String,
    /// Regular expression matched against candidate names.
    pub name_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub id: String,
}

/// Cloud provider abstraction.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logs (e.g. "command").
    fn name(&self) -> &str;

    /// Create the resource and return once the provider confirmed it.
    async fn create_resource(&self, request: &CreateRequest) -> Result<CreatedResource, ProviderError>;

    /// Availability candidates in the filter's compartment, in provider order.
    /// Implementations may pre-filter on `name_pattern`; the engine applies
    /// the pattern again before picking the first match.
    async fn list_availability_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Candidate>, ProviderError>;
}
