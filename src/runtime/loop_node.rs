//! Loop node: re-runs its body DAG while the loop predicate holds
//!
//! Each iteration is a nested run seeded with the carried value; the body's
//! exit value becomes the next carried value. Iterations are sequential.

use std::sync::Arc;

use crate::binding::ResolvedInputs;
use crate::error::NodeError;
use crate::event::EventKind;
use crate::model::{Dag, LoopPredicate, Node, Port};
use crate::store::{Completion, LoopStop};

use super::context::RunContext;
use super::executor::Activation;
use super::graph::{execute_graph, nested_value};

pub(super) struct LoopSettings<'a> {
    pub outputs: &'a [Port],
    pub body: &'a Arc<Dag>,
    pub predicate: &'a dyn LoopPredicate,
    pub max_iterations: Option<u32>,
}

pub(super) async fn run(
    node: &Node,
    settings: LoopSettings<'_>,
    inputs: &ResolvedInputs,
    ctx: &RunContext,
) -> Result<Activation, NodeError> {
    let node_id = ctx.scoped(&node.id);
    let mut carried = inputs.to_value();
    let mut iterations = 0u32;

    let stop = loop {
        let proceed = settings
            .predicate
            .should_continue(&carried, iterations)
            .await
            .map_err(|e| NodeError::behavior("loop predicate", e))?;
        if !proceed {
            break LoopStop::PredicateFalse;
        }
        if settings.max_iterations.is_some_and(|max| iterations >= max) {
            break LoopStop::IterationLimitReached;
        }

        ctx.emit(EventKind::LoopIteration {
            node_id: Arc::clone(&node_id),
            iteration: iterations,
        });
        let label = format!("{}[{}]", node.id, iterations);
        let run = execute_graph(Arc::clone(settings.body), carried, ctx.nested(&label)).await;
        carried = nested_value(run, &label)?;
        iterations += 1;
    };

    if stop == LoopStop::IterationLimitReached {
        tracing::warn!(node = %node_id, iterations, "loop hit its iteration limit");
        ctx.emit(EventKind::LoopLimitReached {
            node_id,
            iterations,
        });
    }

    Ok(Activation::broadcast(
        settings.outputs,
        carried,
        Completion::Loop { iterations, stop },
    ))
}
