//! Nodes - a closed sum type over the five node kinds
//!
//! Every node shares `{id, label, metadata, inputs}`; the [`NodeKind`]
//! carries the kind-specific outputs, behavior and embedded sub-DAGs.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use smallvec::SmallVec;

use super::behavior::{LoopPredicate, Predicate, Reducer, Transform};
use super::dag::Dag;
use super::port::{Port, FALSE_PORT, TRUE_PORT};

/// Output ports of a node: most nodes have 1-4
pub type PortRefs<'a> = SmallVec<[&'a Port; 4]>;

/// One output branch of a FanOut node
#[derive(Clone)]
pub struct Branch {
    pub port: Port,
    /// Runs as a nested run seeded with the fan-out input. `None` forwards the input.
    pub body: Option<Arc<Dag>>,
}

impl Branch {
    pub fn passthrough(port: impl Into<Port>) -> Self {
        Self {
            port: port.into(),
            body: None,
        }
    }

    pub fn with_body(port: impl Into<Port>, body: Dag) -> Self {
        Self {
            port: port.into(),
            body: Some(Arc::new(body)),
        }
    }
}

/// Kind-specific part of a node
#[derive(Clone)]
pub enum NodeKind {
    Execution {
        outputs: Vec<Port>,
        transform: Arc<dyn Transform>,
    },
    /// Outputs are always exactly `[true, false]`
    Conditional {
        outputs: [Port; 2],
        predicate: Arc<dyn Predicate>,
    },
    Loop {
        outputs: Vec<Port>,
        body: Arc<Dag>,
        predicate: Arc<dyn LoopPredicate>,
        max_iterations: Option<u32>,
    },
    FanOut {
        branches: Vec<Branch>,
    },
    Aggregator {
        outputs: Vec<Port>,
        reducer: Arc<dyn Reducer>,
    },
}

impl NodeKind {
    /// Kind name as used in events and serialized documents
    pub fn name(&self) -> &'static str {
        match self {
            Self::Execution { .. } => "execution",
            Self::Conditional { .. } => "conditional",
            Self::Loop { .. } => "loop",
            Self::FanOut { .. } => "fan_out",
            Self::Aggregator { .. } => "aggregator",
        }
    }
}

/// A node of the graph
#[derive(Clone)]
pub struct Node {
    pub id: Arc<str>,
    pub label: String,
    pub metadata: Map<String, Value>,
    pub inputs: Vec<Port>,
    pub kind: NodeKind,
}

impl Node {
    fn with_kind(id: &str, inputs: Vec<Port>, kind: NodeKind) -> Self {
        Self {
            id: Arc::from(id),
            label: id.to_string(),
            metadata: Map::new(),
            inputs,
            kind,
        }
    }

    pub fn execution(
        id: &str,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        transform: Arc<dyn Transform>,
    ) -> Self {
        Self::with_kind(id, inputs, NodeKind::Execution { outputs, transform })
    }

    pub fn conditional(id: &str, inputs: Vec<Port>, predicate: Arc<dyn Predicate>) -> Self {
        Self::with_kind(
            id,
            inputs,
            NodeKind::Conditional {
                outputs: [Port::new(TRUE_PORT), Port::new(FALSE_PORT)],
                predicate,
            },
        )
    }

    pub fn looping(
        id: &str,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        body: Dag,
        predicate: Arc<dyn LoopPredicate>,
        max_iterations: Option<u32>,
    ) -> Self {
        Self::with_kind(
            id,
            inputs,
            NodeKind::Loop {
                outputs,
                body: Arc::new(body),
                predicate,
                max_iterations,
            },
        )
    }

    pub fn fan_out(id: &str, inputs: Vec<Port>, branches: Vec<Branch>) -> Self {
        Self::with_kind(id, inputs, NodeKind::FanOut { branches })
    }

    pub fn aggregator(
        id: &str,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        reducer: Arc<dyn Reducer>,
    ) -> Self {
        Self::with_kind(id, inputs, NodeKind::Aggregator { outputs, reducer })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Output ports in declaration order (branch order for FanOut)
    pub fn output_ports(&self) -> PortRefs<'_> {
        match &self.kind {
            NodeKind::Execution { outputs, .. }
            | NodeKind::Loop { outputs, .. }
            | NodeKind::Aggregator { outputs, .. } => outputs.iter().collect(),
            NodeKind::Conditional { outputs, .. } => outputs.iter().collect(),
            NodeKind::FanOut { branches } => branches.iter().map(|b| &b.port).collect(),
        }
    }

    #[inline]
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| &*p.id == port)
    }

    #[inline]
    pub fn has_output(&self, port: &str) -> bool {
        self.output_ports().iter().any(|p| &*p.id == port)
    }

    #[inline]
    pub fn is_aggregator(&self) -> bool {
        matches!(self.kind, NodeKind::Aggregator { .. })
    }

    /// Embedded sub-DAGs, keyed by a path segment naming where they live
    pub fn sub_dags(&self) -> Vec<(String, &Arc<Dag>)> {
        match &self.kind {
            NodeKind::Loop { body, .. } => vec![(self.id.to_string(), body)],
            NodeKind::FanOut { branches } => branches
                .iter()
                .filter_map(|b| {
                    b.body
                        .as_ref()
                        .map(|body| (format!("{}.{}", self.id, b.port.id), body))
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind.name())
            .field("label", &self.label)
            .field("inputs", &self.inputs)
            .field("outputs", &self.output_ports())
            .finish()
    }
}
