//! Store Module - per-run state
//!
//! Thread-safe storage for node execution results.
//! Uses DashMap for lock-free concurrent access.
//!
//! Key types:
//! - `DataStore`: results of one run, keyed by node id
//! - `NodeResult`: status, output and attempt count of one node
//! - `NodeStatus` / `Completion` / `LoopStop`: what happened to it

mod datastore;

pub use datastore::{Completion, DataStore, LoopStop, NodeResult, NodeStatus};
