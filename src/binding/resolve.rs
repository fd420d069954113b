//! ResolvedInputs - the values a node is about to run with
//!
//! Produced by [`PortRouter::resolve_inputs`](super::PortRouter::resolve_inputs)
//! and kept unchanged across retries of the same node.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Value of one input port at dispatch time
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Value(Value),
    /// Unconnected port of a non-seeded node, or every feed was silenced
    Unavailable,
}

impl PortValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Unavailable becomes `null`
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::Unavailable => Value::Null,
        }
    }
}

/// Input values of one node, in declared input-port order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    ports: Vec<(Arc<str>, PortValue)>,
    /// Run input, for seeded nodes that declare no input ports
    seed: Option<Value>,
}

impl ResolvedInputs {
    pub fn new(ports: Vec<(Arc<str>, PortValue)>, seed: Option<Value>) -> Self {
        Self { ports, seed }
    }

    pub fn get(&self, port: &str) -> Option<&PortValue> {
        self.ports
            .iter()
            .find(|(id, _)| &**id == port)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortValue)> {
        self.ports.iter().map(|(id, v)| (id.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Single-value view used by Execution, Conditional, Loop and FanOut nodes
    ///
    /// - no input ports: the run seed (or `null`)
    /// - one input port: its value
    /// - several ports: a record keyed by port id, in declaration order
    pub fn to_value(&self) -> Value {
        match self.ports.as_slice() {
            [] => self.seed.clone().unwrap_or(Value::Null),
            [(_, single)] => single.clone().into_value(),
            many => Value::Object(
                many.iter()
                    .map(|(id, v)| (id.to_string(), v.clone().into_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Values in declared port order (Unavailable → `null`), used by Aggregators
    pub fn ordered_values(&self) -> Vec<Value> {
        self.ports
            .iter()
            .map(|(_, v)| v.clone().into_value())
            .collect()
    }

    /// Record view for event payloads
    pub fn to_json(&self) -> Value {
        if self.ports.is_empty() {
            return self.to_value();
        }
        Value::Object(
            self.ports
                .iter()
                .map(|(id, v)| (id.to_string(), v.clone().into_value()))
                .collect(),
        )
    }
}
