//! Conditional node: forwards its input on `true` or `false`, silences the other

use crate::binding::ResolvedInputs;
use crate::error::NodeError;
use crate::event::EventKind;
use crate::model::{Node, Port, Predicate, FALSE_PORT, TRUE_PORT};
use crate::store::Completion;

use super::context::RunContext;
use super::executor::Activation;

pub(super) async fn run(
    node: &Node,
    outputs: &[Port; 2],
    predicate: &dyn Predicate,
    inputs: &ResolvedInputs,
    ctx: &RunContext,
) -> Result<Activation, NodeError> {
    let value = inputs.to_value();
    let taken = predicate
        .evaluate(&value)
        .await
        .map_err(|e| NodeError::behavior("predicate", e))?;

    let chosen = if taken { TRUE_PORT } else { FALSE_PORT };
    let mut activation = Activation::new(value.clone(), Completion::Branch { taken });
    for port in outputs {
        if &*port.id == chosen {
            activation.publish(&port.id, value.clone());
        } else {
            activation.silence(&port.id);
        }
    }

    ctx.emit(EventKind::BranchTaken {
        node_id: ctx.scoped(&node.id),
        branch: taken,
    });
    Ok(activation)
}
