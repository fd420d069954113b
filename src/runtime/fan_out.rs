//! FanOut node: sends its input down every branch
//!
//! Branches with a body run as concurrent nested runs; the first failure
//! drops the others, which cancels their in-flight nodes.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Map, Value};

use crate::binding::ResolvedInputs;
use crate::error::NodeError;
use crate::event::EventKind;
use crate::model::{Branch, Node};
use crate::store::Completion;

use super::context::RunContext;
use super::executor::Activation;
use super::graph::{execute_graph, nested_value};

pub(super) async fn run(
    node: &Node,
    branches: &[Branch],
    inputs: &ResolvedInputs,
    ctx: &RunContext,
) -> Result<Activation, NodeError> {
    let input = inputs.to_value();
    let node_id = ctx.scoped(&node.id);

    let pending = branches.iter().map(|branch| {
        let input = input.clone();
        let node_id = Arc::clone(&node_id);
        async move {
            let value = match &branch.body {
                None => input,
                Some(body) => {
                    let label = format!("{}.{}", node.id, branch.port.id);
                    let run = execute_graph(Arc::clone(body), input, ctx.nested(&label)).await;
                    nested_value(run, &label)?
                }
            };
            ctx.emit(EventKind::FanOutBranchCompleted {
                node_id,
                port: Arc::clone(&branch.port.id),
            });
            Ok::<_, NodeError>((Arc::clone(&branch.port.id), value))
        }
    });
    let results = try_join_all(pending).await?;

    let value = Value::Object(
        results
            .iter()
            .map(|(port, v)| (port.to_string(), v.clone()))
            .collect::<Map<String, Value>>(),
    );
    Ok(Activation {
        value,
        published: results,
        silenced: Vec::new(),
        completion: Completion::FanOut {
            branches: branches.len(),
        },
    })
}
