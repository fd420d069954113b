//! Graph scheduler - drives one run (top-level or nested) to completion
//!
//! Performance notes:
//! - one tokio task per node activation, collected through a JoinSet
//! - routing state lives on the scheduler; node tasks only see their own inputs
//!
//! The scheduler loop:
//! ```text
//! dispatch ready nodes → wait for (cancel | deadline | a node task)
//!        ↑                                  ↓
//!        └──── route outputs, skip dead nodes, queue newly ready ones
//! ```
//! After the first failure no further node is dispatched; in-flight nodes
//! are cancelled and drained before the run reports.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::binding::{PortRouter, Readiness, ResolvedInputs};
use crate::dag::FlowGraph;
use crate::error::{DagflowError, NodeError, Result};
use crate::event::EventKind;
use crate::model::{Dag, Node};
use crate::store::{DataStore, NodeResult, NodeStatus};

use super::aggregator;
use super::context::RunContext;
use super::executor::{self, Activation};

/// Exit values of a successful run, in exit-declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    exits: Vec<(Arc<str>, Arc<Value>)>,
}

impl RunOutput {
    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.exits
            .iter()
            .find(|(id, _)| &**id == node_id)
            .map(|(_, v)| v.as_ref())
    }

    pub fn exits(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.exits.iter().map(|(id, v)| (id.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.exits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exits.is_empty()
    }

    /// One exit: its value. Several: a record keyed by node id. None: `None`.
    pub fn value(&self) -> Option<Value> {
        match self.exits.as_slice() {
            [] => None,
            [(_, single)] => Some(single.as_ref().clone()),
            many => Some(Value::Object(
                many.iter()
                    .map(|(id, v)| (id.to_string(), v.as_ref().clone()))
                    .collect(),
            )),
        }
    }

    pub fn into_value(self) -> Value {
        self.value().unwrap_or(Value::Null)
    }
}

/// Everything one graph execution produced
pub(crate) struct GraphRun {
    pub outcome: Result<RunOutput>,
    pub results: DataStore,
    pub duration: Duration,
}

/// Boxed so loop and fan-out executors can recurse into nested runs
pub(crate) fn execute_graph(
    dag: Arc<Dag>,
    input: Value,
    ctx: RunContext,
) -> BoxFuture<'static, GraphRun> {
    drive(dag, input, ctx).boxed()
}

/// Exit value of a nested run, or the error its owner node fails with
pub(crate) fn nested_value(run: GraphRun, scope: &str) -> std::result::Result<Value, NodeError> {
    match run.outcome {
        Ok(output) => output.value().ok_or_else(|| NodeError::NoExitValue {
            scope: scope.to_string(),
        }),
        Err(err) => Err(nested_error(err, scope)),
    }
}

fn nested_error(err: DagflowError, scope: &str) -> NodeError {
    match err {
        DagflowError::NodeFailed { node_id, cause, .. } => NodeError::SubDag {
            scope: scope.to_string(),
            node_id,
            cause: Box::new(cause),
        },
        DagflowError::NodePanicked { node_id, details } => NodeError::SubDag {
            scope: scope.to_string(),
            node_id,
            cause: Box::new(NodeError::Behavior {
                kind: "panic",
                message: details,
            }),
        },
        DagflowError::Cancelled { .. } => NodeError::Cancelled,
        DagflowError::RunTimeout { timeout_ms } => NodeError::Timeout { timeout_ms },
        DagflowError::ExitNotReached { .. } => NodeError::NoExitValue {
            scope: scope.to_string(),
        },
        other => NodeError::Behavior {
            kind: "nested run",
            message: other.to_string(),
        },
    }
}

// ═══════════════════════════════════════════════════════════════
// NODE TASKS
// ═══════════════════════════════════════════════════════════════

enum NodeOutcome {
    Done(Activation),
    Failed(NodeError),
    Panicked(String),
}

struct NodeRun {
    node_id: Arc<str>,
    outcome: NodeOutcome,
    attempts: u32,
    duration: Duration,
}

/// Body of one node task: every attempt, backoff and retry event
async fn run_node(node: Arc<Node>, inputs: Arc<ResolvedInputs>, ctx: RunContext) -> NodeRun {
    let started = Instant::now();
    let scoped = ctx.scoped(&node.id);
    // Survives a panic in any attempt, unlike the count in `Attempted`
    let invoked = AtomicU32::new(0);

    let attempts = ctx.retry.execute(
        &ctx.cancel,
        |_| {
            invoked.fetch_add(1, Ordering::Relaxed);
            let node = Arc::clone(&node);
            let inputs = Arc::clone(&inputs);
            let ctx = ctx.clone();
            async move { ctx.guard(executor::execute(&node, &inputs, &ctx)).await }
        },
        |attempt, err, delay| {
            warn!(node = %scoped, attempt, error = %err, "node attempt failed, retrying");
            ctx.emit(EventKind::NodeRetrying {
                node_id: Arc::clone(&scoped),
                attempt,
                error: err.to_string(),
                delay_ms: delay.as_millis() as u64,
            });
        },
    );

    let (outcome, attempts) = match AssertUnwindSafe(attempts).catch_unwind().await {
        Ok(attempted) => match attempted.result {
            Ok(activation) => (NodeOutcome::Done(activation), attempted.attempts),
            Err(err) => (NodeOutcome::Failed(err), attempted.attempts),
        },
        Err(payload) => (
            NodeOutcome::Panicked(panic_message(payload.as_ref())),
            invoked.load(Ordering::Relaxed).max(1),
        ),
    };

    NodeRun {
        node_id: Arc::clone(&node.id),
        outcome,
        attempts,
        duration: started.elapsed(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ═══════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════

enum Wake {
    Cancelled,
    TimedOut,
    Joined(std::result::Result<NodeRun, JoinError>),
    Drained,
}

struct Scheduler {
    dag: Arc<Dag>,
    flow: Arc<FlowGraph>,
    router: PortRouter,
    store: DataStore,
    ctx: RunContext,
    input: Value,
    /// Nodes that receive the run input
    seeds: FxHashSet<Arc<str>>,
    ready: VecDeque<Arc<str>>,
    /// Queued, dispatched or skipped: never looked at again
    settled: FxHashSet<Arc<str>>,
    tasks: JoinSet<NodeRun>,
    failure: Option<DagflowError>,
}

impl Scheduler {
    fn new(dag: Arc<Dag>, input: Value, ctx: RunContext) -> Self {
        let flow = Arc::new(FlowGraph::from_dag(&dag));
        let router = PortRouter::new(Arc::clone(&dag), Arc::clone(&flow));

        let seeds: FxHashSet<Arc<str>> = match dag.entry() {
            Some(entry) => std::iter::once(Arc::from(entry)).collect(),
            None => flow.roots().into_iter().collect(),
        };

        let mut scheduler = Self {
            dag,
            flow,
            router,
            store: DataStore::new(),
            ctx,
            input,
            seeds,
            ready: VecDeque::new(),
            settled: FxHashSet::default(),
            tasks: JoinSet::new(),
            failure: None,
        };

        // Seeds are queued in declaration order
        let ordered: Vec<Arc<str>> = scheduler
            .dag
            .nodes()
            .iter()
            .filter(|n| scheduler.seeds.contains(&n.id))
            .map(|n| Arc::clone(&n.id))
            .collect();
        for id in ordered {
            scheduler.settled.insert(Arc::clone(&id));
            scheduler.ready.push_back(id);
        }
        scheduler
    }

    fn dispatch(&mut self, id: Arc<str>) {
        let Some(node) = self.dag.node(&id).cloned() else {
            return;
        };
        let seed = self.seeds.contains(&id).then_some(&self.input);
        let inputs = self.router.resolve_inputs(&node, seed);

        self.store.insert(Arc::clone(&id), NodeResult::running());
        self.ctx.emit(EventKind::NodeStarted {
            node_id: self.ctx.scoped(&id),
            kind: node.kind.name().to_string(),
            inputs: inputs.to_json(),
        });
        debug!(
            run_id = %self.ctx.run_id,
            node = %self.ctx.scoped(&id),
            kind = node.kind.name(),
            nested = self.ctx.is_nested(),
            "dispatching node"
        );

        self.tasks.spawn(run_node(node, Arc::new(inputs), self.ctx.clone()));
    }

    /// Record the first failure and cancel everything still in flight
    fn fail(&mut self, err: DagflowError) {
        if self.failure.is_none() {
            warn!(error = %err, scope = %self.ctx.scope, "run failing");
            self.failure = Some(err);
            self.ready.clear();
            self.ctx.cancel.cancel();
        }
    }

    fn on_joined(&mut self, joined: std::result::Result<NodeRun, JoinError>) {
        let run = match joined {
            Ok(run) => run,
            Err(err) => {
                // Tasks are never aborted while the scheduler is alive
                self.fail(DagflowError::NodePanicked {
                    node_id: "unknown".to_string(),
                    details: err.to_string(),
                });
                return;
            }
        };

        let scoped = self.ctx.scoped(&run.node_id);
        let duration_ms = run.duration.as_millis() as u64;

        match run.outcome {
            NodeOutcome::Done(activation) => {
                let output = Arc::new(activation.value.clone());
                self.store.insert(
                    Arc::clone(&run.node_id),
                    NodeResult {
                        output: Arc::clone(&output),
                        status: NodeStatus::Completed,
                        completion: Some(activation.completion.clone()),
                        attempts: run.attempts,
                        duration: run.duration,
                    },
                );
                self.ctx.emit(EventKind::NodeCompleted {
                    node_id: scoped,
                    output,
                    attempts: run.attempts,
                    duration_ms,
                });
                if self.failure.is_none() {
                    self.route(&run.node_id, &activation);
                }
            }
            NodeOutcome::Failed(err) if err.is_cancelled() && self.failure.is_some() => {
                self.store.insert(
                    Arc::clone(&run.node_id),
                    NodeResult::cancelled(run.attempts, run.duration),
                );
                self.ctx.emit(EventKind::NodeCancelled { node_id: scoped });
            }
            NodeOutcome::Failed(err) => {
                self.store.insert(
                    Arc::clone(&run.node_id),
                    NodeResult::failed(err.to_string(), run.attempts, run.duration),
                );
                self.ctx.emit(EventKind::NodeFailed {
                    node_id: scoped,
                    error: err.to_string(),
                    attempts: run.attempts,
                    duration_ms,
                });
                self.fail(DagflowError::NodeFailed {
                    node_id: run.node_id.to_string(),
                    attempts: run.attempts,
                    cause: err,
                });
            }
            NodeOutcome::Panicked(details) => {
                self.store.insert(
                    Arc::clone(&run.node_id),
                    NodeResult::failed(format!("panicked: {details}"), run.attempts, run.duration),
                );
                self.ctx.emit(EventKind::NodeFailed {
                    node_id: scoped,
                    error: format!("panicked: {details}"),
                    attempts: run.attempts,
                    duration_ms,
                });
                self.fail(DagflowError::NodePanicked {
                    node_id: run.node_id.to_string(),
                    details,
                });
            }
        }
    }

    /// Push an activation's outputs through the router and queue what became ready
    fn route(&mut self, node_id: &str, activation: &Activation) {
        let mut touched: VecDeque<Arc<str>> = VecDeque::new();
        for (port, value) in &activation.published {
            touched.extend(self.router.publish_output(node_id, port, value));
        }
        for port in &activation.silenced {
            touched.extend(self.router.silence_output(node_id, port));
        }
        self.advance(touched);
    }

    fn advance(&mut self, mut pending: VecDeque<Arc<str>>) {
        while let Some(id) = pending.pop_front() {
            if self.settled.contains(&id) {
                continue;
            }
            let Some(node) = self.dag.node(&id).cloned() else {
                continue;
            };

            let readiness = if node.is_aggregator() {
                let collection = aggregator::collect(&node, &self.router);
                if collection.readiness == Readiness::Waiting {
                    self.ctx.emit(EventKind::AggregatorCollecting {
                        node_id: self.ctx.scoped(&id),
                        received: collection.received,
                        expected: collection.expected,
                    });
                }
                collection.readiness
            } else {
                self.router.readiness(&node)
            };

            match readiness {
                Readiness::Waiting => {}
                Readiness::Ready => {
                    self.settled.insert(Arc::clone(&id));
                    self.ready.push_back(id);
                }
                Readiness::Skipped => {
                    self.settled.insert(Arc::clone(&id));
                    self.store.insert(Arc::clone(&id), NodeResult::skipped());
                    self.ctx.emit(EventKind::NodeSkipped {
                        node_id: self.ctx.scoped(&id),
                    });
                    for port in node.output_ports() {
                        pending.extend(self.router.silence_output(&id, &port.id));
                    }
                }
            }
        }
    }

    fn finish(self, started: Instant) -> GraphRun {
        let outcome = match self.failure {
            Some(err) => Err(err),
            None => collect_exits(&self.dag, &self.flow, &self.store),
        };
        GraphRun {
            outcome,
            results: self.store,
            duration: started.elapsed(),
        }
    }
}

/// Declared exits must each have completed or been skipped by branch selection.
/// Without declared exits, the completed final nodes are reported.
fn collect_exits(dag: &Dag, flow: &FlowGraph, store: &DataStore) -> Result<RunOutput> {
    let declared = !dag.exits().is_empty();
    let candidates: Vec<Arc<str>> = if declared {
        dag.exits().to_vec()
    } else {
        flow.get_final_nodes()
    };

    let mut exits = Vec::new();
    let mut missing = Vec::new();
    for id in candidates {
        match store.status(&id) {
            NodeStatus::Completed => {
                if let Some(output) = store.get_output(&id) {
                    exits.push((id, output));
                }
            }
            NodeStatus::Skipped => {}
            _ if declared => missing.push(id.to_string()),
            _ => {}
        }
    }

    if missing.is_empty() {
        Ok(RunOutput { exits })
    } else {
        Err(DagflowError::ExitNotReached { missing })
    }
}

async fn until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn drive(dag: Arc<Dag>, input: Value, ctx: RunContext) -> GraphRun {
    let started = Instant::now();
    let cancel = ctx.cancel.clone();
    let deadline = ctx.deadline;
    let timeout_ms = ctx.config.timeout_ms.unwrap_or_default();
    let mut scheduler = Scheduler::new(dag, input, ctx);

    loop {
        if scheduler.failure.is_none() && cancel.is_cancelled() {
            scheduler.fail(DagflowError::Cancelled {
                reason: "cancellation requested".to_string(),
            });
        }
        if scheduler.failure.is_none() {
            while let Some(id) = scheduler.ready.pop_front() {
                scheduler.dispatch(id);
            }
        }
        if scheduler.tasks.is_empty() {
            break;
        }

        let watching = scheduler.failure.is_none();
        let wake = tokio::select! {
            biased;
            _ = cancel.cancelled(), if watching => Wake::Cancelled,
            _ = until(deadline), if watching && deadline.is_some() => Wake::TimedOut,
            Some(joined) = scheduler.tasks.join_next() => Wake::Joined(joined),
            else => Wake::Drained,
        };

        match wake {
            Wake::Cancelled => scheduler.fail(DagflowError::Cancelled {
                reason: "cancellation requested".to_string(),
            }),
            Wake::TimedOut => scheduler.fail(DagflowError::RunTimeout { timeout_ms }),
            Wake::Joined(joined) => scheduler.on_joined(joined),
            Wake::Drained => break,
        }
    }

    scheduler.finish(started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(pairs: &[(&str, Value)]) -> RunOutput {
        RunOutput {
            exits: pairs
                .iter()
                .map(|(id, v)| (Arc::from(*id), Arc::new(v.clone())))
                .collect(),
        }
    }

    #[test]
    fn single_exit_value_is_unwrapped() {
        assert_eq!(output(&[("end", json!(5))]).value(), Some(json!(5)));
    }

    #[test]
    fn several_exits_become_a_record() {
        let out = output(&[("b", json!(2)), ("a", json!(1))]);
        assert_eq!(out.value(), Some(json!({"b": 2, "a": 1})));
        assert_eq!(out.get("a"), Some(&json!(1)));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn no_exit_is_none() {
        assert_eq!(output(&[]).value(), None);
        assert_eq!(output(&[]).into_value(), Value::Null);
    }

    #[test]
    fn nested_failure_keeps_inner_node() {
        let err = nested_error(
            DagflowError::NodeFailed {
                node_id: "inner".into(),
                attempts: 1,
                cause: NodeError::behavior("transform", anyhow::anyhow!("boom")),
            },
            "loop[1]",
        );
        match err {
            NodeError::SubDag { scope, node_id, .. } => {
                assert_eq!(scope, "loop[1]");
                assert_eq!(node_id, "inner");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(nested_error(
            DagflowError::Cancelled {
                reason: "x".into()
            },
            "s"
        )
        .is_cancelled());
    }
}
