//! Execution node: `output = transform(input)`, broadcast on every output port

use crate::binding::ResolvedInputs;
use crate::error::NodeError;
use crate::model::{Port, Transform};
use crate::store::Completion;

use super::executor::Activation;

pub(super) async fn run(
    outputs: &[Port],
    transform: &dyn Transform,
    inputs: &ResolvedInputs,
) -> Result<Activation, NodeError> {
    let output = transform
        .apply(inputs.to_value())
        .await
        .map_err(|e| NodeError::behavior("transform", e))?;
    Ok(Activation::broadcast(outputs, output, Completion::Transformed))
}
