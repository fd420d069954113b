//! dagflow - DAG execution engine with typed nodes and port routing
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  model/     Port, Node, NodeKind, Dag, DagBuilder, behaviors │
//! │  loader/    YAML/JSON documents → Dag (BehaviorRegistry)     │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  dag/       FlowGraph index, validate_dag                    │
//! │  binding/   PortRouter, ResolvedInputs                       │
//! │  runtime/   Runner, scheduler, one executor per node kind    │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  store/      Per-run node results (DataStore, NodeResult)    │
//! │  event/      Progress events (EventLog, EventEmitter)        │
//! │  resilience/ Retry with exponential backoff                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`model`] | In-memory graph model, frozen after building |
//! | [`loader`] | Serialized documents and named behaviors |
//! | [`dag`] | Connection index with FxHashMap, structural validation |
//! | [`binding`] | Value delivery along connections, node readiness |
//! | [`runtime`] | Run coordination with tokio concurrency |
//! | [`store`] | Thread-safe node result storage (DashMap) |
//! | [`event`] | Progress sink and in-memory event log |
//! | [`resilience`] | Retry policy for failed node attempts |
//! | [`config`] | Run configuration (file, env, setters) |
//! | [`error`] | Error types with fix suggestions |
//!
//! ## Example
//!
//! ```rust,ignore
//! use dagflow::{model::*, Runner};
//! use serde_json::json;
//!
//! let mut b = DagBuilder::new("double");
//! b.add_node(Node::execution(
//!     "twice",
//!     ports(["in"]),
//!     ports(["out"]),
//!     transform_fn(|v| async move { Ok(json!(v.as_i64().unwrap_or(0) * 2)) }),
//! ))?;
//! b.set_entry("twice").add_exit("twice");
//!
//! let output = Runner::new(b.build_validated()?).run(json!(21)).await?;
//! assert_eq!(output.into_value(), json!(42));
//! ```

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL - in-memory graph and its serialized form
// ═══════════════════════════════════════════════════════════════
pub mod loader;
pub mod model;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - validation, routing, execution
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod dag;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - storage, events, retries
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod resilience;
pub mod store;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use config::RunConfig;
pub use dag::validate_dag;
pub use error::{DagflowError, FixSuggestion, NodeError, Result, StructuralError};
pub use event::{EventEmitter, EventKind, EventLog};
pub use loader::{BehaviorRegistry, DagLoader};
pub use model::{Dag, DagBuilder, Node};
pub use runtime::{RunOutput, RunReport, Runner};
