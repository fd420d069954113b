//! RunContext - what every node task of one (possibly nested) run shares

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::NodeError;
use crate::event::{EventEmitter, EventKind};
use crate::resilience::RetryPolicy;

#[derive(Clone)]
pub(crate) struct RunContext {
    pub run_id: Arc<str>,
    pub config: Arc<RunConfig>,
    pub retry: RetryPolicy,
    pub emitter: Arc<dyn EventEmitter>,
    pub cancel: CancellationToken,
    /// Prefix of node ids in events: empty at top level, `loop[2]/` when nested
    pub scope: Arc<str>,
    /// Whole-run deadline; only the top-level scheduler watches it
    pub deadline: Option<Instant>,
}

impl RunContext {
    pub fn root(
        run_id: Arc<str>,
        config: Arc<RunConfig>,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> Self {
        let deadline = config.timeout().map(|t| Instant::now() + t);
        let retry = RetryPolicy::new(config.retry.clone());
        Self {
            run_id,
            config,
            retry,
            emitter,
            cancel,
            scope: Arc::from(""),
            deadline,
        }
    }

    /// Context of a nested run labelled `label` (e.g. `loop[2]`, `fan.left`)
    ///
    /// The child token is cancelled with the parent, never the other way round.
    pub fn nested(&self, label: &str) -> Self {
        Self {
            scope: Arc::from(format!("{}{}/", self.scope, label)),
            cancel: self.cancel.child_token(),
            deadline: None,
            ..self.clone()
        }
    }

    pub fn is_nested(&self) -> bool {
        !self.scope.is_empty()
    }

    /// Node id as it appears in events
    pub fn scoped(&self, node_id: &str) -> Arc<str> {
        if self.scope.is_empty() {
            Arc::from(node_id)
        } else {
            Arc::from(format!("{}{}", self.scope, node_id))
        }
    }

    pub fn emit(&self, kind: EventKind) -> u64 {
        self.emitter.emit(kind)
    }

    /// Run one node attempt under the per-node deadline and the run's cancellation
    pub async fn guard<T>(
        &self,
        attempt: impl Future<Output = Result<T, NodeError>>,
    ) -> Result<T, NodeError> {
        let bounded = async {
            match self.config.node_timeout_ms {
                Some(timeout_ms) => {
                    tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), attempt)
                        .await
                        .unwrap_or(Err(NodeError::Timeout { timeout_ms }))
                }
                None => attempt.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NodeError::Cancelled),
            result = bounded => result,
        }
    }
}
