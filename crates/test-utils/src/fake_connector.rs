#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cloudstep::errors::ExecutionError;
use cloudstep::exec::{CommandOutput, RemoteConnector, Session};
use cloudstep::graph::{ResolvedCommand, ResolvedTarget};

#[derive(Debug, Clone)]
enum Behaviour {
    Exit { code: i32, output: String },
    Hang,
}

#[derive(Default)]
struct State {
    runs: Vec<(String, String)>,
    rules: Vec<(String, Behaviour)>,
    unreachable: Vec<String>,
    refusals_left: usize,
    connects: usize,
}

/// A fake remote connector that:
/// - records every `(user@host, command)` it runs
/// - succeeds by default
/// - refuses connections to unreachable hosts, or the first `n` connects
///   after [`FakeConnector::refuse_first`]
/// - exits non-zero or never returns for commands containing a registered
///   substring
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<State>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(self, needle: &str, code: i32, output: &str) -> Self {
        self.state.lock().unwrap().rules.push((
            needle.to_string(),
            Behaviour::Exit {
                code,
                output: output.to_string(),
            },
        ));
        self
    }

    pub fn hang_when(self, needle: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rules
            .push((needle.to_string(), Behaviour::Hang));
        self
    }

    pub fn unreachable(self, host: &str) -> Self {
        self.state.lock().unwrap().unreachable.push(host.to_string());
        self
    }

    /// Refuse the next `n` connects, as a host that is still booting would.
    pub fn refuse_first(self, n: usize) -> Self {
        self.state.lock().unwrap().refusals_left = n;
        self
    }

    /// Connection attempts so far, refused ones included.
    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .runs
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .runs
            .iter()
            .map(|(d, _)| d.clone())
            .collect()
    }

    pub fn runs_matching(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self, target: &ResolvedTarget) -> Result<Box<dyn Session>, ExecutionError> {
        {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            let refused = if state.unreachable.contains(&target.host) {
                true
            } else if state.refusals_left > 0 {
                state.refusals_left -= 1;
                true
            } else {
                false
            };
            if refused {
                return Err(ExecutionError::Connection {
                    host: target.host.clone(),
                    message: "connection refused".to_string(),
                });
            }
        }
        Ok(Box::new(FakeSession {
            destination: target.destination(),
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    destination: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Session for FakeSession {
    async fn run(&mut self, command: &ResolvedCommand) -> Result<CommandOutput, ExecutionError> {
        let behaviour = {
            let mut state = self.state.lock().unwrap();
            state
                .runs
                .push((self.destination.clone(), command.command.clone()));
            state
                .rules
                .iter()
                .find(|(needle, _)| command.command.contains(needle.as_str()))
                .map(|(_, b)| b.clone())
        };

        match behaviour {
            None => Ok(CommandOutput::new(0, "ok")),
            Some(Behaviour::Exit { code, output }) => Ok(CommandOutput::new(code, output)),
            Some(Behaviour::Hang) => std::future::pending().await,
        }
    }
}
