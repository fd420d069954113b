//! PortRouter - moves values along connections for one run
//!
//! Every connection is in one of three delivery states:
//! - `Pending`: the source has not finished
//! - `Value`: the source published on this connection's port
//! - `Dead`: the source will never publish there (unchosen branch, skipped node)
//!
//! Readiness rule: a node is ready once every input port with incoming
//! connections has heard from all of them. Ports without connections are
//! satisfied with no value. A node whose connected ports are all dead is
//! skipped instead of run.

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::dag::FlowGraph;
use crate::model::{Dag, Node};

use super::resolve::{PortValue, ResolvedInputs};

/// Nodes touched by one publish: usually a handful
pub type Targets = SmallVec<[Arc<str>; 4]>;

#[derive(Debug, Clone)]
enum Delivery {
    Pending,
    Value(Value),
    Dead,
}

/// State of one input port
#[derive(Debug, Clone, PartialEq)]
pub enum PortState {
    /// No incoming connections
    Unconnected,
    /// At least one feed has not delivered yet
    Waiting,
    /// Every feed was silenced
    Dead,
    /// Fed and delivered; a port with several live feeds (aggregators only)
    /// receives them as an array in connection order
    Value(Value),
}

/// Whether a node can be dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Waiting,
    Ready,
    Skipped,
}

/// Per-run routing buffers; never shared between runs
pub struct PortRouter {
    dag: Arc<Dag>,
    flow: Arc<FlowGraph>,
    deliveries: Vec<Delivery>,
}

impl PortRouter {
    pub fn new(dag: Arc<Dag>, flow: Arc<FlowGraph>) -> Self {
        let deliveries = vec![Delivery::Pending; dag.connections().len()];
        Self {
            dag,
            flow,
            deliveries,
        }
    }

    /// Deliver `value` on every connection leaving `node_id.port`
    ///
    /// Returns the target nodes, deduplicated, in connection order.
    pub fn publish_output(&mut self, node_id: &str, port: &str, value: &Value) -> Targets {
        self.deliver(node_id, port, |_| Delivery::Value(value.clone()))
    }

    /// Mark every connection leaving `node_id.port` as dead
    pub fn silence_output(&mut self, node_id: &str, port: &str) -> Targets {
        self.deliver(node_id, port, |_| Delivery::Dead)
    }

    fn deliver(
        &mut self,
        node_id: &str,
        port: &str,
        mut make: impl FnMut(usize) -> Delivery,
    ) -> Targets {
        let mut targets = Targets::new();
        for &idx in self.flow.fanout(node_id, port) {
            self.deliveries[idx] = make(idx);
            let target = &self.dag.connections()[idx].target.node;
            if !targets.contains(target) {
                targets.push(Arc::clone(target));
            }
        }
        targets
    }

    /// Current state of `node_id.port`
    pub fn port_state(&self, node_id: &str, port: &str) -> PortState {
        let feeds = self.flow.feeds(node_id, port);
        if feeds.is_empty() {
            return PortState::Unconnected;
        }

        let mut live: SmallVec<[&Value; 2]> = SmallVec::new();
        for &idx in feeds {
            match &self.deliveries[idx] {
                Delivery::Pending => return PortState::Waiting,
                Delivery::Value(v) => live.push(v),
                Delivery::Dead => {}
            }
        }

        match live.as_slice() {
            [] => PortState::Dead,
            [single] => PortState::Value((*single).clone()),
            many => PortState::Value(Value::Array(many.iter().map(|v| (*v).clone()).collect())),
        }
    }

    /// Generic readiness of a non-aggregator node
    pub fn readiness(&self, node: &Node) -> Readiness {
        let mut connected = 0usize;
        let mut dead = 0usize;
        for port in &node.inputs {
            match self.port_state(&node.id, &port.id) {
                PortState::Waiting => return Readiness::Waiting,
                PortState::Unconnected => {}
                PortState::Dead => {
                    connected += 1;
                    dead += 1;
                }
                PortState::Value(_) => connected += 1,
            }
        }

        if connected > 0 && connected == dead {
            Readiness::Skipped
        } else {
            Readiness::Ready
        }
    }

    /// Resolve the inputs of a node about to run
    ///
    /// `seed` is the run input for seeded nodes; it fills every unconnected port.
    pub fn resolve_inputs(&self, node: &Node, seed: Option<&Value>) -> ResolvedInputs {
        let ports = node
            .inputs
            .iter()
            .map(|port| {
                let value = match self.port_state(&node.id, &port.id) {
                    PortState::Value(v) => PortValue::Value(v),
                    PortState::Unconnected => seed
                        .map(|s| PortValue::Value(s.clone()))
                        .unwrap_or(PortValue::Unavailable),
                    PortState::Waiting | PortState::Dead => PortValue::Unavailable,
                };
                (Arc::clone(&port.id), value)
            })
            .collect();
        ResolvedInputs::new(ports, seed.cloned())
    }
}
