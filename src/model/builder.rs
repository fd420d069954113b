//! DagBuilder - incremental construction, then freeze
//!
//! Connection ids are generated from a builder-local counter (`c1`, `c2`, ...)
//! unless the caller supplies one with [`DagBuilder::connect_with_id`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{DagflowError, Result};

use super::dag::{Connection, Dag, Endpoint};
use super::node::Node;

#[derive(Debug)]
pub struct DagBuilder {
    id: Arc<str>,
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    entry: Option<Arc<str>>,
    exits: Vec<Arc<str>>,
    next_connection: u64,
}

impl DagBuilder {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: Arc::from(id.as_ref()),
            nodes: Vec::new(),
            connections: Vec::new(),
            entry: None,
            exits: Vec::new(),
            next_connection: 0,
        }
    }

    /// Add a node; ids must be unique within this DAG
    pub fn add_node(&mut self, node: Node) -> Result<&mut Self> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(DagflowError::DuplicateNode {
                dag_id: self.id.to_string(),
                node_id: node.id.to_string(),
            });
        }
        self.nodes.push(node);
        Ok(self)
    }

    /// Remove a node and every connection touching it
    ///
    /// Entry/exit designations are left alone so the validator can report them.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| &*n.id == id)?;
        self.connections
            .retain(|c| &*c.source.node != id && &*c.target.node != id);
        Some(self.nodes.remove(pos))
    }

    /// Connect `from.from_port → to.to_port`, returning the generated connection id
    pub fn connect(&mut self, from: &str, from_port: &str, to: &str, to_port: &str) -> Arc<str> {
        let id = loop {
            self.next_connection += 1;
            let candidate = format!("c{}", self.next_connection);
            if !self.connections.iter().any(|c| *c.id == *candidate) {
                break Arc::<str>::from(candidate);
            }
        };
        self.connections.push(Connection {
            id: Arc::clone(&id),
            source: Endpoint::new(from, from_port),
            target: Endpoint::new(to, to_port),
        });
        id
    }

    /// Connect with a caller-supplied connection id
    pub fn connect_with_id(
        &mut self,
        id: &str,
        from: &str,
        from_port: &str,
        to: &str,
        to_port: &str,
    ) -> Result<&mut Self> {
        if self.connections.iter().any(|c| &*c.id == id) {
            return Err(DagflowError::DuplicateConnection {
                dag_id: self.id.to_string(),
                connection_id: id.to_string(),
            });
        }
        self.connections.push(Connection {
            id: Arc::from(id),
            source: Endpoint::new(from, from_port),
            target: Endpoint::new(to, to_port),
        });
        Ok(self)
    }

    /// Remove a connection by id; returns whether it existed
    pub fn disconnect(&mut self, connection_id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| &*c.id != connection_id);
        self.connections.len() != before
    }

    pub fn set_entry(&mut self, id: &str) -> &mut Self {
        self.entry = Some(Arc::from(id));
        self
    }

    pub fn add_exit(&mut self, id: &str) -> &mut Self {
        if !self.exits.iter().any(|e| &**e == id) {
            self.exits.push(Arc::from(id));
        }
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| &*n.id == id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Freeze without validating
    pub fn build(self) -> Dag {
        let index: FxHashMap<Arc<str>, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (Arc::clone(&n.id), i))
            .collect();
        Dag {
            id: self.id,
            nodes: self.nodes.into_iter().map(Arc::new).collect(),
            index,
            connections: self.connections,
            entry: self.entry,
            exits: self.exits,
        }
    }

    /// Freeze and run the structural validator (sub-DAGs included)
    pub fn build_validated(self) -> Result<Dag> {
        let dag = self.build();
        let errors = crate::dag::validate_dag(&dag);
        if errors.is_empty() {
            Ok(dag)
        } else {
            Err(DagflowError::InvalidGraph {
                dag_id: dag.id.to_string(),
                errors,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ports, transform_fn};

    fn passthrough(id: &str) -> Node {
        Node::execution(
            id,
            ports(["in"]),
            ports(["out"]),
            transform_fn(|v| async move { Ok(v) }),
        )
    }

    #[test]
    fn duplicate_node_is_rejected() {
        let mut b = DagBuilder::new("g");
        b.add_node(passthrough("a")).unwrap();
        let err = b.add_node(passthrough("a")).unwrap_err();
        assert_eq!(err.code(), "DAGFLOW-001");
    }

    #[test]
    fn generated_connection_ids_are_unique() {
        let mut b = DagBuilder::new("g");
        b.add_node(passthrough("a")).unwrap();
        b.add_node(passthrough("b")).unwrap();
        b.connect_with_id("c2", "a", "out", "b", "in").unwrap();
        let first = b.connect("a", "out", "b", "in");
        let second = b.connect("a", "out", "b", "in");
        assert_eq!(&*first, "c1");
        assert_eq!(&*second, "c3");
    }

    #[test]
    fn duplicate_connection_id_is_rejected() {
        let mut b = DagBuilder::new("g");
        b.connect_with_id("x", "a", "out", "b", "in").unwrap();
        assert!(b.connect_with_id("x", "a", "out", "b", "in").is_err());
    }

    #[test]
    fn remove_node_cascades_connections() {
        let mut b = DagBuilder::new("g");
        for id in ["a", "b", "c"] {
            b.add_node(passthrough(id)).unwrap();
        }
        b.connect("a", "out", "b", "in");
        b.connect("b", "out", "c", "in");
        b.connect("a", "out", "c", "in");

        assert!(b.remove_node("b").is_some());
        assert_eq!(b.connections().len(), 1);
        assert!(b.remove_node("b").is_none());
    }

    #[test]
    fn disconnect_reports_existence() {
        let mut b = DagBuilder::new("g");
        let id = b.connect("a", "out", "b", "in");
        assert!(b.disconnect(&id));
        assert!(!b.disconnect(&id));
    }

    #[test]
    fn exits_are_a_set() {
        let mut b = DagBuilder::new("g");
        b.add_exit("a").add_exit("a").add_exit("b");
        let dag = b.build();
        assert_eq!(dag.exits().len(), 2);
    }

    #[test]
    fn build_indexes_nodes() {
        let mut b = DagBuilder::new("g");
        b.add_node(passthrough("a")).unwrap();
        b.set_entry("a");
        let dag = b.build();
        assert!(dag.contains("a"));
        assert_eq!(dag.node("a").map(|n| &*n.id), Some("a"));
        assert_eq!(dag.entry(), Some("a"));
    }
}
