//! Serialized DAG documents (YAML or JSON)
//!
//! ```yaml
//! id: pipeline
//! entry: start
//! exits: [done]
//! nodes:
//!   - id: start
//!     type: execution
//!     config: { transform: identity }
//!   - id: check
//!     type: conditional
//!     config: { predicate: truthy }
//!   - id: done
//!     type: execution
//! edges:
//!   - { from: start, to: check }
//!   - { from: check.true, to: done }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Port;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DagDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exits: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Execution,
    Conditional,
    Loop,
    FanOut,
    Aggregator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Defaults to a single `in` port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<PortDocument>>,
    /// Defaults to a single `out` port (ignored by conditional and fan-out)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<PortDocument>>,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A port given either as a bare id or in full
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortDocument {
    Id(String),
    Full(Port),
}

impl PortDocument {
    pub fn to_port(&self) -> Port {
        match self {
            Self::Id(id) => Port::new(id),
            Self::Full(port) => port.clone(),
        }
    }
}

/// Behavior names and kind-specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reducer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    /// Loop body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<DagDocument>>,
    /// FanOut branches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchDocument {
    pub port: PortDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<DagDocument>,
}

/// `from: node[.port]`, `to: node[.port]`
///
/// The port may be omitted when the node has exactly one port on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
}

/// Split `node.port` at the first dot
pub(crate) fn split_endpoint(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('.') {
        Some((node, port)) => (node, Some(port)),
        None => (raw, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_accept_bare_ids_and_full_form() {
        let doc: Vec<PortDocument> =
            serde_yaml::from_str("[a, {id: b, label: Second, data_type: number}]").unwrap();
        assert_eq!(&*doc[0].to_port().id, "a");
        let full = doc[1].to_port();
        assert_eq!(full.label.as_deref(), Some("Second"));
        assert_eq!(full.data_type.as_deref(), Some("number"));
    }

    #[test]
    fn node_type_is_snake_case() {
        let ty: NodeType = serde_yaml::from_str("fan_out").unwrap();
        assert_eq!(ty, NodeType::FanOut);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_yaml::from_str::<DagDocument>("id: x\nnodez: []").unwrap_err();
        assert!(err.to_string().contains("nodez"));
    }

    #[test]
    fn split_endpoint_forms() {
        assert_eq!(split_endpoint("a.out"), ("a", Some("out")));
        assert_eq!(split_endpoint("a"), ("a", None));
    }
}
