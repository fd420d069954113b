//! Event Module - progress reporting for runs
//!
//! Key types:
//! - `Event`: envelope with id + timestamp + kind
//! - `EventKind`: run, node and fine-grained variants
//! - `Progress` / `Level`: the human-facing view of an event
//! - `EventLog`: thread-safe, append-only log
//! - `EventEmitter`: trait the engine emits through
//! - `NoopEmitter`, `ChannelEmitter`, `TracingEmitter`: other sinks

mod emitter;
mod log;

pub use emitter::{ChannelEmitter, EventEmitter, NoopEmitter, TracingEmitter};
pub use log::{Event, EventKind, EventLog, Level, Progress};
