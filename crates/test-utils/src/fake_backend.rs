#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use cloudstep::dag::ScheduledNode;
use cloudstep::engine::{NodeOutcome, RuntimeEvent};
use cloudstep::errors::Result;
use cloudstep::exec::ExecutorBackend;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A fake backend that:
/// - records which nodes were dispatched
/// - immediately reports NodeStarted + NodeCompleted for each of them,
///   succeeding unless an outcome was registered for the node.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<String>>>,
    outcomes: HashMap<String, NodeOutcome>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, dispatched: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            dispatched,
            outcomes: HashMap::new(),
        }
    }

    pub fn with_outcome(mut self, node: &str, outcome: NodeOutcome) -> Self {
        self.outcomes.insert(node.to_string(), outcome);
        self
    }
}

impl ExecutorBackend for FakeBackend {
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);

        Box::pin(async move {
            for n in nodes {
                dispatched.lock().unwrap().push(n.id.clone());

                let outcome = self
                    .outcomes
                    .get(&n.id)
                    .cloned()
                    .unwrap_or(NodeOutcome::Succeeded { executed: true });

                let now = Instant::now();
                tx.send(RuntimeEvent::NodeStarted {
                    node: n.id.clone(),
                    at: now,
                })
                .await
                .map_err(anyhow::Error::from)?;
                tx.send(RuntimeEvent::NodeCompleted {
                    node: n.id.clone(),
                    outcome,
                    at: now,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
