//! Runtime Module - DAG execution
//!
//! - `runner`: public entry point, validation and run-level events
//! - `graph`: the scheduler loop shared by top-level and nested runs
//! - `context`: per-run shared state (config, cancellation, event scope)
//! - `executor`: dispatch to the five node kinds
//! - `execution`, `conditional`, `loop_node`, `fan_out`, `aggregator`:
//!   one module per node kind
//!
//! This module is the "how". For static structure, see `model` and `dag`.

mod aggregator;
mod conditional;
mod context;
mod execution;
mod executor;
mod fan_out;
mod graph;
mod loop_node;
mod runner;

pub use graph::RunOutput;
pub use runner::{RunReport, Runner};
