// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! dagflow Error Types with Error Codes
//!
//! Error code ranges:
//! - DAGFLOW-000-009: Graph construction errors (builder)
//! - DAGFLOW-010-019: Structural validation errors
//! - DAGFLOW-020-029: Node execution errors
//! - DAGFLOW-030-039: Run lifecycle errors (cancel, timeout, exits)
//! - DAGFLOW-040-049: Configuration errors
//! - DAGFLOW-050-059: Serialized DAG import errors
//!
//! Three layers:
//! - [`StructuralError`]: one finding of the graph validator (never retried)
//! - [`NodeError`]: a single node attempt failing (retried or not, see [`NodeError::is_retryable`])
//! - [`DagflowError`]: what a caller of the engine sees

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DagflowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

// ═══════════════════════════════════════════════════════════════
// STRUCTURAL ERRORS (validator findings)
// ═══════════════════════════════════════════════════════════════

/// A single structural problem found by the validator.
///
/// Validation collects every finding rather than stopping at the first,
/// so this type is `Clone + PartialEq` to make the result comparable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("[DAGFLOW-010] Entry node '{node_id}' does not exist")]
    MissingEntry { node_id: String },

    #[error("[DAGFLOW-011] Exit node '{node_id}' does not exist")]
    MissingExit { node_id: String },

    #[error("[DAGFLOW-012] Connection '{connection_id}' references unknown source node '{node_id}'")]
    DanglingSource {
        connection_id: String,
        node_id: String,
    },

    #[error("[DAGFLOW-013] Connection '{connection_id}' references unknown target node '{node_id}'")]
    DanglingTarget {
        connection_id: String,
        node_id: String,
    },

    #[error("[DAGFLOW-014] Connection '{connection_id}': node '{node_id}' has no output port '{port}'")]
    UnknownOutputPort {
        connection_id: String,
        node_id: String,
        port: String,
    },

    #[error("[DAGFLOW-015] Connection '{connection_id}': node '{node_id}' has no input port '{port}'")]
    UnknownInputPort {
        connection_id: String,
        node_id: String,
        port: String,
    },

    #[error(
        "[DAGFLOW-016] Input port '{node_id}.{port}' is fed by {} connections ({}); only aggregator ports accept fan-in",
        .connections.len(),
        .connections.join(", ")
    )]
    MultipleFeeds {
        node_id: String,
        port: String,
        connections: Vec<String>,
    },

    #[error("[DAGFLOW-017] Cycle detected: {cycle}")]
    CycleDetected { cycle: String },

    #[error(
        "[DAGFLOW-018] Entry node '{node_id}' is the target of connection(s) {}; the run input only reaches a source",
        .connections.join(", ")
    )]
    EntryHasIncoming {
        node_id: String,
        connections: Vec<String>,
    },

    #[error("in sub-DAG of '{path}': {error}")]
    InSubDag {
        path: String,
        error: Box<StructuralError>,
    },
}

impl StructuralError {
    /// Wrap this error with the id path of the node that owns the sub-DAG.
    pub fn nested(self, owner: &str) -> Self {
        match self {
            Self::InSubDag { path, error } => Self::InSubDag {
                path: format!("{owner}/{path}"),
                error,
            },
            other => Self::InSubDag {
                path: owner.to_string(),
                error: Box::new(other),
            },
        }
    }

    /// Innermost error, stripping sub-DAG wrappers.
    pub fn root_cause(&self) -> &StructuralError {
        match self {
            Self::InSubDag { error, .. } => error.root_cause(),
            other => other,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// NODE ERRORS (one executor attempt)
// ═══════════════════════════════════════════════════════════════

/// Failure of a single node activation.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    /// The user-supplied transform/predicate/reducer returned an error.
    #[error("{kind} behavior failed: {message}")]
    Behavior { kind: &'static str, message: String },

    /// A nested run (loop body or fan-out branch) failed.
    #[error("{scope} failed at node '{node_id}': {cause}")]
    SubDag {
        scope: String,
        node_id: String,
        cause: Box<NodeError>,
    },

    /// A nested run finished without reaching its exit nodes.
    #[error("{scope} produced no exit value")]
    NoExitValue { scope: String },

    #[error("attempt exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn behavior(kind: &'static str, err: anyhow::Error) -> Self {
        Self::Behavior {
            kind,
            message: format!("{err:#}"),
        }
    }

    /// Only failures of this node's own attempt are retried.
    ///
    /// A nested run already retried its inner nodes, so `SubDag` and
    /// `NoExitValue` are final, as is cancellation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Behavior { .. } | Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ═══════════════════════════════════════════════════════════════
// ENGINE ERRORS
// ═══════════════════════════════════════════════════════════════

fn format_structural(errors: &[StructuralError]) -> String {
    match errors {
        [] => "no errors".to_string(),
        [single] => single.to_string(),
        many => format!(
            "{} errors: {}",
            many.len(),
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum DagflowError {
    // ═══════════════════════════════════════════
    // BUILDER ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-001] Duplicate node id '{node_id}' in DAG '{dag_id}'")]
    #[diagnostic(code(dagflow::duplicate_node), help("Node ids must be unique within one DAG"))]
    DuplicateNode { dag_id: String, node_id: String },

    #[error("[DAGFLOW-002] Duplicate connection id '{connection_id}' in DAG '{dag_id}'")]
    #[diagnostic(code(dagflow::duplicate_connection))]
    DuplicateConnection { dag_id: String, connection_id: String },

    // ═══════════════════════════════════════════
    // VALIDATION (010-019)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-010] DAG '{dag_id}' is invalid: {}", format_structural(.errors))]
    #[diagnostic(
        code(dagflow::invalid_graph),
        help("Fix the structural errors before running")
    )]
    InvalidGraph {
        dag_id: String,
        errors: Vec<StructuralError>,
    },

    // ═══════════════════════════════════════════
    // EXECUTION (020-029)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-020] Node '{node_id}' failed after {attempts} attempt(s): {cause}")]
    #[diagnostic(code(dagflow::node_failed))]
    NodeFailed {
        node_id: String,
        attempts: u32,
        cause: NodeError,
    },

    #[error("[DAGFLOW-021] Node task '{node_id}' panicked: {details}")]
    #[diagnostic(code(dagflow::node_panicked))]
    NodePanicked { node_id: String, details: String },

    // ═══════════════════════════════════════════
    // RUN LIFECYCLE (030-039)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-030] Run cancelled: {reason}")]
    #[diagnostic(code(dagflow::cancelled))]
    Cancelled { reason: String },

    #[error("[DAGFLOW-031] Run exceeded its {timeout_ms}ms deadline")]
    #[diagnostic(code(dagflow::run_timeout))]
    RunTimeout { timeout_ms: u64 },

    #[error("[DAGFLOW-032] Run finished but exit node(s) never completed: {}", .missing.join(", "))]
    #[diagnostic(code(dagflow::exit_not_reached))]
    ExitNotReached { missing: Vec<String> },

    // ═══════════════════════════════════════════
    // CONFIGURATION (040-049)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-040] Configuration error: {reason}")]
    #[diagnostic(code(dagflow::config))]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // IMPORT (050-059)
    // ═══════════════════════════════════════════
    #[error("[DAGFLOW-050] Failed to parse DAG document: {details}")]
    #[diagnostic(code(dagflow::parse_error))]
    ParseError { details: String },

    #[error("[DAGFLOW-051] Node '{node_id}': {reason}")]
    #[diagnostic(code(dagflow::load_error))]
    LoadError { node_id: String, reason: String },

    #[error("[DAGFLOW-052] Unknown {kind} behavior '{name}' on node '{node_id}'")]
    #[diagnostic(code(dagflow::unknown_behavior))]
    UnknownBehavior {
        kind: &'static str,
        name: String,
        node_id: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DagflowError {
    /// Stable error code (for logs and programmatic matching)
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateNode { .. } => "DAGFLOW-001",
            Self::DuplicateConnection { .. } => "DAGFLOW-002",
            Self::InvalidGraph { .. } => "DAGFLOW-010",
            Self::NodeFailed { .. } => "DAGFLOW-020",
            Self::NodePanicked { .. } => "DAGFLOW-021",
            Self::Cancelled { .. } => "DAGFLOW-030",
            Self::RunTimeout { .. } => "DAGFLOW-031",
            Self::ExitNotReached { .. } => "DAGFLOW-032",
            Self::ConfigError { .. } => "DAGFLOW-040",
            Self::ParseError { .. } => "DAGFLOW-050",
            Self::LoadError { .. } => "DAGFLOW-051",
            Self::UnknownBehavior { .. } => "DAGFLOW-052",
            Self::Io(_) => "DAGFLOW-090",
        }
    }

    /// Node id the run failed on, if the failure is attributable to one node.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            Self::NodeFailed { node_id, .. } | Self::NodePanicked { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Structural errors are fatal before a run starts; everything else
    /// happened during one.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidGraph { .. })
    }
}

impl FixSuggestion for DagflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::DuplicateNode { .. } => Some("Rename one of the nodes"),
            Self::DuplicateConnection { .. } => Some("Use unique connection ids"),
            Self::InvalidGraph { .. } => {
                Some("Run `dagflow validate` and fix each reported connection or node")
            }
            Self::NodeFailed { .. } => {
                Some("Inspect the node's behavior or raise max_retries for transient failures")
            }
            Self::NodePanicked { .. } => Some("A node behavior panicked; return an error instead"),
            Self::Cancelled { .. } => None,
            Self::RunTimeout { .. } => Some("Raise timeout_ms or DAGFLOW_TIMEOUT_MS"),
            Self::ExitNotReached { .. } => {
                Some("Check that every exit node is reachable from the entry node")
            }
            Self::ConfigError { .. } => Some("Check ~/.config/dagflow/config.toml syntax"),
            Self::ParseError { .. } => Some("Check YAML/JSON syntax of the DAG document"),
            Self::LoadError { .. } => Some("Check the node's type and config block"),
            Self::UnknownBehavior { .. } => {
                Some("Register the behavior in the BehaviorRegistry before loading")
            }
            Self::Io(_) => Some("Check file path and permissions"),
        }
    }
}
