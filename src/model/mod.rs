//! Graph Model - nodes, ports, connections and the frozen Dag
//!
//! - `port`: Port and the fixed Conditional port ids
//! - `node`: Node + NodeKind closed sum type
//! - `behavior`: async traits for the opaque per-kind behaviors
//! - `dag`: immutable Dag with query operations
//! - `builder`: DagBuilder (add/remove/connect/disconnect, then freeze)

mod behavior;
mod builder;
mod dag;
mod node;
mod port;

pub use behavior::{
    loop_predicate_fn, predicate_fn, reducer_fn, transform_fn, LoopPredicate, Predicate, Reducer,
    Transform,
};
pub use builder::DagBuilder;
pub use dag::{Connection, Dag, Endpoint};
pub use node::{Branch, Node, NodeKind, PortRefs};
pub use port::{ports, Port, FALSE_PORT, TRUE_PORT};
