//! Node executors - one activation of one node
//!
//! Dispatches on [`NodeKind`] and returns an [`Activation`]: the node's
//! value plus which output ports were published and which were silenced.
//! Retries happen one level up, in the scheduler's node task.

use std::sync::Arc;

use serde_json::Value;

use crate::binding::ResolvedInputs;
use crate::error::NodeError;
use crate::model::{Node, NodeKind, Port};
use crate::store::Completion;

use super::context::RunContext;
use super::{aggregator, conditional, execution, fan_out, loop_node};

/// Outcome of one successful activation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Activation {
    /// What the node produced, as stored and reported
    pub value: Value,
    pub published: Vec<(Arc<str>, Value)>,
    pub silenced: Vec<Arc<str>>,
    pub completion: Completion,
}

impl Activation {
    pub fn new(value: Value, completion: Completion) -> Self {
        Self {
            value,
            published: Vec::new(),
            silenced: Vec::new(),
            completion,
        }
    }

    /// Publish `value` on every port
    pub fn broadcast(ports: &[Port], value: Value, completion: Completion) -> Self {
        let published = ports
            .iter()
            .map(|p| (Arc::clone(&p.id), value.clone()))
            .collect();
        Self {
            published,
            ..Self::new(value, completion)
        }
    }

    pub fn publish(&mut self, port: &Arc<str>, value: Value) {
        self.published.push((Arc::clone(port), value));
    }

    pub fn silence(&mut self, port: &Arc<str>) {
        self.silenced.push(Arc::clone(port));
    }
}

/// Run one attempt of `node`
pub(crate) async fn execute(
    node: &Node,
    inputs: &ResolvedInputs,
    ctx: &RunContext,
) -> Result<Activation, NodeError> {
    match &node.kind {
        NodeKind::Execution { outputs, transform } => {
            execution::run(outputs, transform.as_ref(), inputs).await
        }
        NodeKind::Conditional { outputs, predicate } => {
            conditional::run(node, outputs, predicate.as_ref(), inputs, ctx).await
        }
        NodeKind::Loop {
            outputs,
            body,
            predicate,
            max_iterations,
        } => {
            let settings = loop_node::LoopSettings {
                outputs,
                body,
                predicate: predicate.as_ref(),
                max_iterations: *max_iterations,
            };
            loop_node::run(node, settings, inputs, ctx).await
        }
        NodeKind::FanOut { branches } => fan_out::run(node, branches, inputs, ctx).await,
        NodeKind::Aggregator { outputs, reducer } => {
            aggregator::run(outputs, reducer.as_ref(), inputs).await
        }
    }
}
