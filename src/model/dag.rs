//! Dag - frozen graph of nodes and connections
//!
//! Built with [`DagBuilder`](super::DagBuilder) and read-only afterwards:
//! the engine shares it behind `Arc` for the whole run, nested runs included.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::node::Node;

/// One side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub node: Arc<str>,
    pub port: Arc<str>,
}

impl Endpoint {
    pub fn new(node: impl AsRef<str>, port: impl AsRef<str>) -> Self {
        Self {
            node: Arc::from(node.as_ref()),
            port: Arc::from(port.as_ref()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub id: Arc<str>,
    pub source: Endpoint,
    pub target: Endpoint,
}

/// Immutable graph handed to the engine
#[derive(Clone)]
pub struct Dag {
    pub(super) id: Arc<str>,
    pub(super) nodes: Vec<Arc<Node>>,
    pub(super) index: FxHashMap<Arc<str>, usize>,
    pub(super) connections: Vec<Connection>,
    pub(super) entry: Option<Arc<str>>,
    pub(super) exits: Vec<Arc<str>>,
}

impl Dag {
    pub fn builder(id: impl AsRef<str>) -> super::DagBuilder {
        super::DagBuilder::new(id)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn node(&self, id: &str) -> Option<&Arc<Node>> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order (order carries no meaning for execution)
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn exits(&self) -> &[Arc<str>] {
        &self.exits
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Connections arriving at `node_id`
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| &*c.target.node == node_id)
    }

    /// Connections leaving `node_id`
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| &*c.source.node == node_id)
    }
}

impl fmt::Debug for Dag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dag")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .field("connections", &self.connections)
            .field("entry", &self.entry)
            .field("exits", &self.exits)
            .finish()
    }
}
