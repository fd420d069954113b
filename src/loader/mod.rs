//! Loader Module - serialized documents → in-memory DAGs
//!
//! - `document`: serde types for the YAML/JSON form
//! - `registry`: behavior names → behavior instances
//!
//! The engine never sees documents; it only runs the [`Dag`] built here.

mod document;
mod registry;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DagflowError, Result};
use crate::model::{Branch, Dag, DagBuilder, Node, Port};

pub use document::{
    BranchDocument, DagDocument, EdgeDocument, NodeConfig, NodeDocument, NodeType, PortDocument,
};
pub use registry::{is_truthy, BehaviorRegistry};

use document::split_endpoint;

const DEFAULT_INPUT: &str = "in";
const DEFAULT_OUTPUT: &str = "out";

/// Builds DAGs from documents using a [`BehaviorRegistry`]
#[derive(Clone)]
pub struct DagLoader {
    registry: BehaviorRegistry,
}

impl Default for DagLoader {
    fn default() -> Self {
        Self::new(BehaviorRegistry::with_builtins())
    }
}

impl DagLoader {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BehaviorRegistry {
        &mut self.registry
    }

    pub fn parse_yaml(source: &str) -> Result<DagDocument> {
        serde_yaml::from_str(source).map_err(|e| DagflowError::ParseError {
            details: e.to_string(),
        })
    }

    pub fn parse_json(source: &str) -> Result<DagDocument> {
        serde_json::from_str(source).map_err(|e| DagflowError::ParseError {
            details: e.to_string(),
        })
    }

    pub fn from_yaml_str(&self, source: &str) -> Result<Dag> {
        self.build(&Self::parse_yaml(source)?)
    }

    pub fn from_json_str(&self, source: &str) -> Result<Dag> {
        self.build(&Self::parse_json(source)?)
    }

    /// Load a `.json` file as JSON, anything else as YAML
    pub async fn load_path(&self, path: &Path) -> Result<Dag> {
        let source = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            self.from_json_str(&source)
        } else {
            self.from_yaml_str(&source)
        }
    }

    /// Build the DAG without validating it; run [`crate::dag::validate_dag`] or
    /// let the runner do it.
    pub fn build(&self, doc: &DagDocument) -> Result<Dag> {
        let mut builder = DagBuilder::new(&doc.id);
        for node in &doc.nodes {
            builder.add_node(self.build_node(node)?)?;
        }

        for edge in &doc.edges {
            let (from, from_port) = split_endpoint(&edge.from);
            let (to, to_port) = split_endpoint(&edge.to);
            let from_port = match from_port {
                Some(port) => port.to_string(),
                None => sole_port(&builder, from, Side::Output)?,
            };
            let to_port = match to_port {
                Some(port) => port.to_string(),
                None => sole_port(&builder, to, Side::Input)?,
            };
            match &edge.id {
                Some(id) => {
                    builder.connect_with_id(id, from, &from_port, to, &to_port)?;
                }
                None => {
                    builder.connect(from, &from_port, to, &to_port);
                }
            }
        }

        if let Some(entry) = &doc.entry {
            builder.set_entry(entry);
        }
        for exit in &doc.exits {
            builder.add_exit(exit);
        }

        debug!(
            dag = %doc.id,
            nodes = doc.nodes.len(),
            edges = doc.edges.len(),
            "loaded DAG document"
        );
        Ok(builder.build())
    }

    fn build_node(&self, doc: &NodeDocument) -> Result<Node> {
        let id = doc.id.as_str();
        let inputs = port_list(doc.inputs.as_deref(), DEFAULT_INPUT);
        let outputs = port_list(doc.outputs.as_deref(), DEFAULT_OUTPUT);
        let config = &doc.config;

        let node = match doc.node_type {
            NodeType::Execution => {
                let name = config.transform.as_deref().unwrap_or("identity");
                let transform = self
                    .registry
                    .transform(name)
                    .ok_or_else(|| unknown("transform", name, id))?;
                Node::execution(id, inputs, outputs, transform)
            }
            NodeType::Conditional => {
                let name = config.predicate.as_deref().unwrap_or("truthy");
                let predicate = self
                    .registry
                    .predicate(name)
                    .ok_or_else(|| unknown("predicate", name, id))?;
                Node::conditional(id, inputs, predicate)
            }
            NodeType::Loop => {
                let name = config.predicate.as_deref().unwrap_or("while_truthy");
                let predicate = self
                    .registry
                    .loop_predicate(name)
                    .ok_or_else(|| unknown("loop predicate", name, id))?;
                let body = config.body.as_deref().ok_or_else(|| DagflowError::LoadError {
                    node_id: id.to_string(),
                    reason: "loop node needs a `body` document".to_string(),
                })?;
                Node::looping(
                    id,
                    inputs,
                    outputs,
                    self.build(body)?,
                    predicate,
                    config.max_iterations,
                )
            }
            NodeType::FanOut => {
                if config.branches.is_empty() {
                    return Err(DagflowError::LoadError {
                        node_id: id.to_string(),
                        reason: "fan-out node needs at least one branch".to_string(),
                    });
                }
                let branches = config
                    .branches
                    .iter()
                    .map(|b| -> Result<Branch> {
                        Ok(Branch {
                            port: b.port.to_port(),
                            body: match &b.body {
                                Some(body) => Some(Arc::new(self.build(body)?)),
                                None => None,
                            },
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Node::fan_out(id, inputs, branches)
            }
            NodeType::Aggregator => {
                let name = config.reducer.as_deref().unwrap_or("collect");
                let reducer = self
                    .registry
                    .reducer(name)
                    .ok_or_else(|| unknown("reducer", name, id))?;
                Node::aggregator(id, inputs, outputs, reducer)
            }
        };

        let mut node = match &doc.label {
            Some(label) => node.with_label(label.clone()),
            None => node,
        };
        node.metadata = doc.metadata.clone();
        Ok(node)
    }
}

fn port_list(ports: Option<&[PortDocument]>, default: &str) -> Vec<Port> {
    match ports {
        Some(ports) => ports.iter().map(PortDocument::to_port).collect(),
        None => vec![Port::new(default)],
    }
}

fn unknown(kind: &'static str, name: &str, node_id: &str) -> DagflowError {
    DagflowError::UnknownBehavior {
        kind,
        name: name.to_string(),
        node_id: node_id.to_string(),
    }
}

#[derive(Clone, Copy)]
enum Side {
    Input,
    Output,
}

/// The single port on one side of `node_id`, for edges that omit it
fn sole_port(builder: &DagBuilder, node_id: &str, side: Side) -> Result<String> {
    let node = builder.node(node_id).ok_or_else(|| DagflowError::LoadError {
        node_id: node_id.to_string(),
        reason: "edge refers to an unknown node".to_string(),
    })?;
    let ids: Vec<&str> = match side {
        Side::Input => node.inputs.iter().map(|p| p.id.as_ref()).collect(),
        Side::Output => node.output_ports().iter().map(|p| p.id.as_ref()).collect(),
    };
    match ids.as_slice() {
        [single] => Ok(single.to_string()),
        _ => Err(DagflowError::LoadError {
            node_id: node_id.to_string(),
            reason: format!(
                "edge must name a port: node has {} {} ports",
                ids.len(),
                match side {
                    Side::Input => "input",
                    Side::Output => "output",
                }
            ),
        }),
    }
}
