//! DAG Runner - public entry point for executing a DAG
//!
//! - validates before anything runs (structural errors are never retried)
//! - one [`CancellationToken`] per runner; every run gets a child of it
//! - run-level events (`RunStarted`, `RunCompleted`, `RunFailed`)

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::RunConfig;
use crate::dag::validate_dag;
use crate::error::{DagflowError, Result};
use crate::event::{EventEmitter, EventKind, NoopEmitter};
use crate::model::Dag;
use crate::store::DataStore;

use super::context::RunContext;
use super::graph::{execute_graph, RunOutput};

/// Everything a finished run produced, including per-node results
pub struct RunReport {
    pub run_id: String,
    pub outcome: Result<RunOutput>,
    /// Results of the top-level nodes (nested runs keep their own)
    pub results: DataStore,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Executes one DAG, any number of times, with shared config and progress sink
pub struct Runner {
    dag: Arc<Dag>,
    config: Arc<RunConfig>,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(dag: Dag) -> Self {
        Self::from_arc(Arc::new(dag))
    }

    pub fn from_arc(dag: Arc<Dag>) -> Self {
        Self {
            dag,
            config: Arc::new(RunConfig::default()),
            emitter: Arc::new(NoopEmitter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Progress sink for every run of this runner
    pub fn with_emitter(mut self, emitter: impl EventEmitter + 'static) -> Self {
        self.emitter = Arc::new(emitter);
        self
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Token that cancels every current and future run of this runner
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run to completion and return the exit values
    pub async fn run(&self, input: Value) -> Result<RunOutput> {
        self.run_detailed(input).await.outcome
    }

    /// Run to completion and keep every node result
    #[instrument(skip(self, input), fields(dag = %self.dag.id(), nodes = self.dag.len()))]
    pub async fn run_detailed(&self, input: Value) -> RunReport {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());

        let errors = validate_dag(&self.dag);
        if !errors.is_empty() {
            let err = DagflowError::InvalidGraph {
                dag_id: self.dag.id().to_string(),
                errors,
            };
            warn!(error = %err, "refusing to run invalid DAG");
            self.emitter.emit(EventKind::RunFailed {
                run_id: run_id.clone(),
                error: err.to_string(),
                failed_node: None,
            });
            return RunReport {
                run_id,
                outcome: Err(err),
                results: DataStore::new(),
                duration: Duration::ZERO,
            };
        }

        info!(run_id = %run_id, environment = %self.config.environment, "starting run");
        self.emitter.emit(EventKind::RunStarted {
            run_id: run_id.clone(),
            dag_id: self.dag.id().to_string(),
            node_count: self.dag.len(),
            environment: self.config.environment.clone(),
        });

        let ctx = RunContext::root(
            Arc::from(run_id.as_str()),
            Arc::clone(&self.config),
            Arc::clone(&self.emitter),
            self.cancel.child_token(),
        );
        let run = execute_graph(Arc::clone(&self.dag), input, ctx).await;

        match &run.outcome {
            Ok(output) => {
                info!(
                    run_id = %run_id,
                    duration_ms = run.duration.as_millis() as u64,
                    "run completed"
                );
                self.emitter.emit(EventKind::RunCompleted {
                    run_id: run_id.clone(),
                    output: Arc::new(output.clone().into_value()),
                    duration_ms: run.duration.as_millis() as u64,
                });
            }
            Err(err) => {
                warn!(run_id = %run_id, code = err.code(), error = %err, "run failed");
                self.emitter.emit(EventKind::RunFailed {
                    run_id: run_id.clone(),
                    error: err.to_string(),
                    failed_node: err.failed_node().map(Arc::from),
                });
            }
        }

        RunReport {
            run_id,
            outcome: run.outcome,
            results: run.results,
            duration: run.duration,
        }
    }
}
