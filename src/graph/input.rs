// src/graph/input.rs

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::errors::ExecutionError;
use crate::graph::outputs::OutputStore;

/// Canonical node identity used throughout the graph, scheduler and engine.
pub type NodeId = String;

/// Reference to an output attribute of another node (e.g. `angel-instance.public_ip`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    pub attribute: String,
}

impl OutputRef {
    pub fn new(node: impl Into<NodeId>, attribute: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attribute: attribute.into(),
        }
    }

    /// Look the attribute up, failing if the owning node has not published it.
    pub fn resolve<'a>(&self, outputs: &'a OutputStore) -> Result<&'a str, ExecutionError> {
        outputs
            .get(self)
            .ok_or_else(|| ExecutionError::Unresolved(self.to_string()))
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// A configuration value: either known at declaration time or produced by
/// another node once it exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Value(Value),
    Output(OutputRef),
    List(Vec<Input>),
    Map(BTreeMap<String, Input>),
}

impl Input {
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Input)>,
        K: Into<String>,
    {
        Input::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Every output reference this value consumes, depth-first.
    pub fn output_refs(&self) -> Vec<&OutputRef> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a OutputRef>) {
        match self {
            Input::Value(_) => {}
            Input::Output(r) => refs.push(r),
            Input::List(items) => items.iter().for_each(|i| i.collect_refs(refs)),
            Input::Map(entries) => entries.values().for_each(|i| i.collect_refs(refs)),
        }
    }

    /// Produce the concrete JSON value, reading referenced outputs.
    pub fn resolve(&self, outputs: &OutputStore) -> Result<Value, ExecutionError> {
        Ok(match self {
            Input::Value(v) => v.clone(),
            Input::Output(r) => Value::String(r.resolve(outputs)?.to_string()),
            Input::List(items) => Value::Array(
                items
                    .iter()
                    .map(|i| i.resolve(outputs))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Input::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in entries {
                    obj.insert(k.clone(), v.resolve(outputs)?);
                }
                Value::Object(obj)
            }
        })
    }

    /// Resolve to a plain string (strings are unquoted, everything else is JSON text).
    pub fn resolve_string(&self, outputs: &OutputStore) -> Result<String, ExecutionError> {
        Ok(match self.resolve(outputs)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl From<OutputRef> for Input {
    fn from(r: OutputRef) -> Self {
        Input::Output(r)
    }
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Input::Value(v)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Value(Value::String(s))
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Value(Value::Bool(b))
    }
}

impl From<i64> for Input {
    fn from(n: i64) -> Self {
        Input::Value(Value::from(n))
    }
}

impl From<u32> for Input {
    fn from(n: u32) -> Self {
        Input::Value(Value::from(n))
    }
}

impl From<u16> for Input {
    fn from(n: u16) -> Self {
        Input::Value(Value::from(n))
    }
}

impl From<Vec<Input>> for Input {
    fn from(items: Vec<Input>) -> Self {
        Input::List(items)
    }
}

/// Desired configuration of a resource, keyed by provider field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceConfig {
    fields: BTreeMap<String, Input>,
}

impl ResourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Input> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn output_refs(&self) -> Vec<&OutputRef> {
        self.fields.values().flat_map(|v| v.output_refs()).collect()
    }

    /// Resolve every field into a JSON object.
    pub fn resolve(&self, outputs: &OutputStore) -> Result<Value, ExecutionError> {
        let mut obj = serde_json::Map::new();
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.resolve(outputs)?);
        }
        Ok(Value::Object(obj))
    }
}
