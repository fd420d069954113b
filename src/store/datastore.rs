//! DataStore - per-run node results with DashMap
//!
//! One entry per node that left `Pending`. Nested runs keep their own store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

/// Lifecycle of a node within one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    /// Every connected input was silenced
    Skipped,
    Failed(String),
    Cancelled,
}

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStop {
    PredicateFalse,
    IterationLimitReached,
}

/// Kind-specific detail of a successful activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    Transformed,
    Branch { taken: bool },
    Loop { iterations: u32, stop: LoopStop },
    FanOut { branches: usize },
    Aggregated { inputs: usize },
}

/// Node execution result
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Arc for O(1) cloning of large JSON structures
    pub output: Arc<Value>,
    pub status: NodeStatus,
    pub completion: Option<Completion>,
    pub attempts: u32,
    pub duration: Duration,
}

impl NodeResult {
    pub fn running() -> Self {
        Self::with_status(NodeStatus::Running)
    }

    pub fn completed(
        output: impl Into<Value>,
        completion: Completion,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self {
            output: Arc::new(output.into()),
            status: NodeStatus::Completed,
            completion: Some(completion),
            attempts,
            duration,
        }
    }

    pub fn skipped() -> Self {
        Self::with_status(NodeStatus::Skipped)
    }

    pub fn failed(error: impl Into<String>, attempts: u32, duration: Duration) -> Self {
        Self {
            attempts,
            duration,
            ..Self::with_status(NodeStatus::Failed(error.into()))
        }
    }

    pub fn cancelled(attempts: u32, duration: Duration) -> Self {
        Self {
            attempts,
            duration,
            ..Self::with_status(NodeStatus::Cancelled)
        }
    }

    fn with_status(status: NodeStatus) -> Self {
        Self {
            output: Arc::new(Value::Null),
            status,
            completion: None,
            attempts: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Completed
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            NodeStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Thread-safe storage for node results
#[derive(Debug, Default)]
pub struct DataStore {
    results: DashMap<Arc<str>, NodeResult>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node_id: Arc<str>, result: NodeResult) {
        self.results.insert(node_id, result);
    }

    pub fn get(&self, node_id: &str) -> Option<NodeResult> {
        self.results.get(node_id).map(|r| r.clone())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    /// `Pending` for nodes that never started
    pub fn status(&self, node_id: &str) -> NodeStatus {
        self.results
            .get(node_id)
            .map(|r| r.status.clone())
            .unwrap_or(NodeStatus::Pending)
    }

    pub fn is_success(&self, node_id: &str) -> bool {
        self.results
            .get(node_id)
            .map(|r| r.is_success())
            .unwrap_or(false)
    }

    /// Output of a completed node (O(1) Arc clone)
    pub fn get_output(&self, node_id: &str) -> Option<Arc<Value>> {
        self.results
            .get(node_id)
            .filter(|r| r.is_success())
            .map(|r| Arc::clone(&r.output))
    }

    /// Node ids with the given status, sorted
    pub fn with_status(&self, status: &NodeStatus) -> Vec<Arc<str>> {
        let mut ids: Vec<Arc<str>> = self
            .results
            .iter()
            .filter(|e| &e.value().status == status)
            .map(|e| Arc::clone(e.key()))
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_and_get_output() {
        let store = DataStore::new();
        store.insert(
            Arc::from("a"),
            NodeResult::completed(json!({"x": 1}), Completion::Transformed, 1, Duration::ZERO),
        );
        assert!(store.is_success("a"));
        assert_eq!(*store.get_output("a").unwrap(), json!({"x": 1}));
        assert_eq!(store.status("a"), NodeStatus::Completed);
    }

    #[test]
    fn unknown_node_is_pending() {
        let store = DataStore::new();
        assert_eq!(store.status("ghost"), NodeStatus::Pending);
        assert!(store.get_output("ghost").is_none());
    }

    #[test]
    fn failed_result_has_no_output() {
        let store = DataStore::new();
        store.insert(Arc::from("f"), NodeResult::failed("boom", 3, Duration::from_millis(5)));
        assert!(store.get_output("f").is_none());
        let result = store.get("f").unwrap();
        assert_eq!(result.error(), Some("boom"));
        assert_eq!(result.attempts, 3);
    }

    #[test]
    fn with_status_is_sorted() {
        let store = DataStore::new();
        store.insert(Arc::from("b"), NodeResult::skipped());
        store.insert(Arc::from("a"), NodeResult::skipped());
        store.insert(Arc::from("c"), NodeResult::running());
        let skipped: Vec<String> = store
            .with_status(&NodeStatus::Skipped)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(skipped, vec!["a", "b"]);
    }

    #[test]
    fn completion_serializes_with_kind_tag() {
        let completion = Completion::Loop {
            iterations: 3,
            stop: LoopStop::IterationLimitReached,
        };
        assert_eq!(
            serde_json::to_value(completion).unwrap(),
            json!({"kind": "loop", "iterations": 3, "stop": "iteration_limit_reached"})
        );
    }
}
