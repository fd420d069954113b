//! EventLog - append-only record of one engine's runs
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run, node and fine-grained (branch/loop/aggregator) variants
//! - EventLog: thread-safe, append-only log
//!
//! Node ids inside nested runs are scoped: `loop[2]/inner`, `fan.left/inner`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the emitter was created (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

impl Event {
    /// Human-facing progress record
    pub fn progress(&self) -> Progress {
        Progress {
            level: self.kind.level(),
            message: self.kind.message(),
            node_id: self.kind.node_id().map(str::to_string),
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Severity of a progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
    Warning,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Debug => "debug",
        })
    }
}

/// What a progress sink shows a human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub level: Level,
    pub message: String,
    pub node_id: Option<String>,
    pub timestamp_ms: u64,
}

/// All possible event types
///
/// Uses Arc<str> for node ids to keep cloning cheap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        run_id: String,
        dag_id: String,
        node_count: usize,
        environment: String,
    },
    RunCompleted {
        run_id: String,
        output: Arc<Value>,
        duration_ms: u64,
    },
    RunFailed {
        run_id: String,
        error: String,
        failed_node: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    NodeStarted {
        node_id: Arc<str>,
        kind: String,
        inputs: Value,
    },
    NodeCompleted {
        node_id: Arc<str>,
        output: Arc<Value>,
        attempts: u32,
        duration_ms: u64,
    },
    NodeFailed {
        node_id: Arc<str>,
        error: String,
        attempts: u32,
        duration_ms: u64,
    },
    NodeRetrying {
        node_id: Arc<str>,
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    NodeSkipped {
        node_id: Arc<str>,
    },
    NodeCancelled {
        node_id: Arc<str>,
    },

    // ═══════════════════════════════════════════
    // FINE-GRAINED
    // ═══════════════════════════════════════════
    BranchTaken {
        node_id: Arc<str>,
        branch: bool,
    },
    LoopIteration {
        node_id: Arc<str>,
        iteration: u32,
    },
    LoopLimitReached {
        node_id: Arc<str>,
        iterations: u32,
    },
    FanOutBranchCompleted {
        node_id: Arc<str>,
        port: Arc<str>,
    },
    AggregatorCollecting {
        node_id: Arc<str>,
        received: usize,
        expected: usize,
    },
}

impl EventKind {
    /// Node id for node-level events
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeRetrying { node_id, .. }
            | Self::NodeSkipped { node_id }
            | Self::NodeCancelled { node_id }
            | Self::BranchTaken { node_id, .. }
            | Self::LoopIteration { node_id, .. }
            | Self::LoopLimitReached { node_id, .. }
            | Self::FanOutBranchCompleted { node_id, .. }
            | Self::AggregatorCollecting { node_id, .. } => Some(node_id),
            Self::RunFailed { failed_node, .. } => failed_node.as_deref(),
            Self::RunStarted { .. } | Self::RunCompleted { .. } => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. }
        )
    }

    pub fn level(&self) -> Level {
        match self {
            Self::RunStarted { .. } | Self::NodeStarted { .. } => Level::Info,
            Self::RunCompleted { .. } | Self::NodeCompleted { .. } => Level::Success,
            Self::RunFailed { .. } | Self::NodeFailed { .. } => Level::Error,
            Self::NodeRetrying { .. }
            | Self::NodeCancelled { .. }
            | Self::LoopLimitReached { .. } => Level::Warning,
            Self::NodeSkipped { .. }
            | Self::BranchTaken { .. }
            | Self::LoopIteration { .. }
            | Self::FanOutBranchCompleted { .. }
            | Self::AggregatorCollecting { .. } => Level::Debug,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::RunStarted {
                dag_id, node_count, ..
            } => format!("run of '{dag_id}' started ({node_count} nodes)"),
            Self::RunCompleted { duration_ms, .. } => format!("run completed in {duration_ms}ms"),
            Self::RunFailed { error, .. } => format!("run failed: {error}"),
            Self::NodeStarted { node_id, kind, .. } => format!("{node_id} ({kind}) started"),
            Self::NodeCompleted {
                node_id,
                attempts,
                duration_ms,
                ..
            } => {
                if *attempts > 1 {
                    format!("{node_id} completed in {duration_ms}ms after {attempts} attempts")
                } else {
                    format!("{node_id} completed in {duration_ms}ms")
                }
            }
            Self::NodeFailed {
                node_id,
                error,
                attempts,
                ..
            } => format!("{node_id} failed after {attempts} attempt(s): {error}"),
            Self::NodeRetrying {
                node_id,
                attempt,
                error,
                delay_ms,
            } => format!("{node_id} attempt {attempt} failed ({error}), retrying in {delay_ms}ms"),
            Self::NodeSkipped { node_id } => format!("{node_id} skipped (no live inputs)"),
            Self::NodeCancelled { node_id } => format!("{node_id} cancelled"),
            Self::BranchTaken { node_id, branch } => format!("{node_id} took the {branch} branch"),
            Self::LoopIteration { node_id, iteration } => {
                format!("{node_id} iteration {iteration}")
            }
            Self::LoopLimitReached {
                node_id,
                iterations,
            } => format!("{node_id} stopped at its iteration limit ({iterations})"),
            Self::FanOutBranchCompleted { node_id, port } => {
                format!("{node_id} branch '{port}' completed")
            }
            Self::AggregatorCollecting {
                node_id,
                received,
                expected,
            } => format!("{node_id} collected {received}/{expected} inputs"),
        }
    }
}

/// Thread-safe, append-only event log
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned - use `with_events` for zero-copy access)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events of one (possibly scoped) node
    pub fn filter_node(&self, node_id: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.node_id() == Some(node_id))
                .cloned()
                .collect()
        })
    }

    pub fn run_events(&self) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.is_run_event())
                .cloned()
                .collect()
        })
    }

    /// Count matching events (no allocation)
    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.with_events(|events| events.iter().filter(|e| pred(&e.kind)).count())
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}
