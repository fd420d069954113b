//! Aggregator node: collects every connected input port, then reduces
//!
//! Aggregators decide their own readiness: a port counts as received once
//! all of its feeds delivered a value or were silenced. The reducer sees
//! values in declared port order, `null` for silenced ports.

use crate::binding::{PortRouter, PortState, Readiness, ResolvedInputs};
use crate::error::NodeError;
use crate::model::{Node, Port, Reducer};
use crate::store::Completion;

use super::executor::Activation;

/// Collection progress of one aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Collection {
    pub readiness: Readiness,
    pub received: usize,
    pub expected: usize,
}

pub(crate) fn collect(node: &Node, router: &PortRouter) -> Collection {
    let (mut expected, mut received, mut dead) = (0usize, 0usize, 0usize);
    for port in &node.inputs {
        match router.port_state(&node.id, &port.id) {
            PortState::Unconnected => continue,
            PortState::Waiting => {}
            PortState::Dead => {
                received += 1;
                dead += 1;
            }
            PortState::Value(_) => received += 1,
        }
        expected += 1;
    }

    let readiness = if received < expected {
        Readiness::Waiting
    } else if expected > 0 && dead == expected {
        Readiness::Skipped
    } else {
        Readiness::Ready
    };

    Collection {
        readiness,
        received,
        expected,
    }
}

pub(super) async fn run(
    outputs: &[Port],
    reducer: &dyn Reducer,
    inputs: &ResolvedInputs,
) -> Result<Activation, NodeError> {
    let live = inputs.iter().filter(|(_, v)| v.as_value().is_some()).count();
    let output = reducer
        .reduce(inputs.ordered_values())
        .await
        .map_err(|e| NodeError::behavior("reducer", e))?;
    Ok(Activation::broadcast(
        outputs,
        output,
        Completion::Aggregated { inputs: live },
    ))
}
