#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cloudstep::errors::ProviderError;
use cloudstep::provider::{Candidate, CandidateFilter, CreateRequest, CreatedResource, Provider};

pub const FAKE_PUBLIC_IP: &str = "203.0.113.10";

#[derive(Default)]
struct State {
    requests: Vec<CreateRequest>,
    failing: HashSet<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// A fake provider that:
/// - records every create request in call order
/// - fails the names registered with `fail_on`
/// - gives instances a `public_ip` and `display_name`
/// - optionally sleeps (tokio time) to make overlap observable
///
/// Clones share the same state.
#[derive(Clone)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
    candidates: Vec<Candidate>,
    latency: Duration,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            candidates: vec![
                Candidate {
                    name: "Uocm:US-CHICAGO-1-AD-1".to_string(),
                    id: "ad-1".to_string(),
                },
                Candidate {
                    name: "Uocm:US-CHICAGO-1-AD-2".to_string(),
                    id: "ad-2".to_string(),
                },
            ],
            latency: Duration::ZERO,
        }
    }

    pub fn fail_on(self, name: &str) -> Self {
        self.state.lock().unwrap().failing.insert(name.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_candidates(mut self, names: &[&str]) -> Self {
        self.candidates = names
            .iter()
            .enumerate()
            .map(|(i, n)| Candidate {
                name: n.to_string(),
                id: format!("candidate-{i}"),
            })
            .collect();
        self
    }

    /// Names passed to `create_resource`, in call order.
    pub fn created(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn request(&self, name: &str) -> Option<CreateRequest> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Highest number of overlapping `create_resource` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_resource(&self, request: &CreateRequest) -> Result<CreatedResource, ProviderError> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.failing.contains(&request.name)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.state.lock().unwrap().in_flight -= 1;

        if fail {
            return Err(ProviderError::CreationFailed(format!(
                "{} rejected by fake provider",
                request.name
            )));
        }

        let mut created = CreatedResource::new(format!("ocid1.test.{}", request.name));
        if request.kind.ends_with("/Instance") {
            let display = request
                .config
                .get("displayName")
                .and_then(|v| v.as_str())
                .unwrap_or(&request.name)
                .to_string();
            created = created
                .with_output("public_ip", FAKE_PUBLIC_IP)
                .with_output("display_name", display);
        }
        Ok(created)
    }

    async fn list_availability_candidates(
        &self,
        _filter: &CandidateFilter,
    ) -> Result<Vec<Candidate>, ProviderError> {
        Ok(self.candidates.clone())
    }
}
