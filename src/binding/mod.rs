//! Binding Module - data routing between node ports
//!
//! - `router`: PortRouter, per-run delivery buffers and readiness
//! - `resolve`: ResolvedInputs / PortValue handed to executors
//!
//! Data flow:
//! ```text
//! node completes → publish_output / silence_output (router)
//!                          ↓
//!              readiness of each target node
//!                          ↓
//!               resolve_inputs → ResolvedInputs
//!                          ↓
//!                     node executor
//! ```

mod resolve;
mod router;

pub use resolve::{PortValue, ResolvedInputs};
pub use router::{PortRouter, PortState, Readiness, Targets};
