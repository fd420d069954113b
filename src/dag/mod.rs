//! DAG Module - graph index and structural validation
//!
//! Contains:
//! - `flow`: FlowGraph built from a Dag's connections
//! - `validate`: structural validation (dangling refs, ports, fan-in, cycles, sub-DAGs)
//!
//! FlowGraph is immutable after construction; one is built per run.

mod flow;
mod validate;

pub use flow::{ConnVec, DepVec, FlowGraph};
pub use validate::validate_dag;
