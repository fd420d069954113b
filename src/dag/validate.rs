//! DAG Validation - structural checks before a run
//!
//! Validates, in order:
//! - entry node exists (if declared) and no connection targets it
//! - exit nodes exist (if declared)
//! - every connection's source and target node exist
//! - every connection uses a declared output / input port
//! - no non-aggregator input port is fed by more than one connection
//! - the connection graph is acyclic
//! - every embedded sub-DAG (loop body, fan-out branch body), recursively
//!
//! Error codes:
//! - DAGFLOW-010/011: missing entry / exit node
//! - DAGFLOW-012/013: dangling connection source / target
//! - DAGFLOW-014/015: unknown output / input port
//! - DAGFLOW-016: multiple connections into one non-aggregator input port
//! - DAGFLOW-017: cycle detected
//! - DAGFLOW-018: entry node is the target of a connection

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::StructuralError;
use crate::model::Dag;

use super::flow::FlowGraph;

/// Validate a DAG, returning every structural error found (empty = valid)
///
/// Pure function of the DAG: validating twice yields the same list.
pub fn validate_dag(dag: &Dag) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    check_entry_and_exits(dag, &mut errors);
    check_connections(dag, &mut errors);
    check_single_feed(dag, &mut errors);

    if let Err(cycle) = FlowGraph::from_dag(dag).detect_cycles() {
        errors.push(cycle);
    }

    for node in dag.nodes() {
        for (path, sub_dag) in node.sub_dags() {
            errors.extend(
                validate_dag(sub_dag)
                    .into_iter()
                    .map(|e| e.nested(&path)),
            );
        }
    }

    debug!(dag = dag.id(), errors = errors.len(), "validated DAG");
    errors
}

fn check_entry_and_exits(dag: &Dag, errors: &mut Vec<StructuralError>) {
    if let Some(entry) = dag.entry() {
        if !dag.contains(entry) {
            errors.push(StructuralError::MissingEntry {
                node_id: entry.to_string(),
            });
        }

        let incoming: Vec<String> = dag
            .connections()
            .iter()
            .filter(|conn| &*conn.target.node == entry)
            .map(|conn| conn.id.to_string())
            .collect();
        if !incoming.is_empty() {
            errors.push(StructuralError::EntryHasIncoming {
                node_id: entry.to_string(),
                connections: incoming,
            });
        }
    }

    for exit in dag.exits() {
        if !dag.contains(exit) {
            errors.push(StructuralError::MissingExit {
                node_id: exit.to_string(),
            });
        }
    }
}

fn check_connections(dag: &Dag, errors: &mut Vec<StructuralError>) {
    for conn in dag.connections() {
        match dag.node(&conn.source.node) {
            None => errors.push(StructuralError::DanglingSource {
                connection_id: conn.id.to_string(),
                node_id: conn.source.node.to_string(),
            }),
            Some(node) if !node.has_output(&conn.source.port) => {
                errors.push(StructuralError::UnknownOutputPort {
                    connection_id: conn.id.to_string(),
                    node_id: conn.source.node.to_string(),
                    port: conn.source.port.to_string(),
                })
            }
            Some(_) => {}
        }

        match dag.node(&conn.target.node) {
            None => errors.push(StructuralError::DanglingTarget {
                connection_id: conn.id.to_string(),
                node_id: conn.target.node.to_string(),
            }),
            Some(node) if !node.has_input(&conn.target.port) => {
                errors.push(StructuralError::UnknownInputPort {
                    connection_id: conn.id.to_string(),
                    node_id: conn.target.node.to_string(),
                    port: conn.target.port.to_string(),
                })
            }
            Some(_) => {}
        }
    }
}

fn check_single_feed(dag: &Dag, errors: &mut Vec<StructuralError>) {
    // Vec keeps the first-seen order so reports are deterministic
    let mut feeds: Vec<((&str, &str), Vec<String>)> = Vec::new();
    let mut slot: FxHashMap<(&str, &str), usize> = FxHashMap::default();

    for conn in dag.connections() {
        let Some(node) = dag.node(&conn.target.node) else {
            continue;
        };
        if node.is_aggregator() || !node.has_input(&conn.target.port) {
            continue;
        }
        let key = (conn.target.node.as_ref(), conn.target.port.as_ref());
        let i = *slot.entry(key).or_insert_with(|| {
            feeds.push((key, Vec::new()));
            feeds.len() - 1
        });
        feeds[i].1.push(conn.id.to_string());
    }

    for ((node_id, port), connections) in feeds {
        if connections.len() > 1 {
            errors.push(StructuralError::MultipleFeeds {
                node_id: node_id.to_string(),
                port: port.to_string(),
                connections,
            });
        }
    }
}
