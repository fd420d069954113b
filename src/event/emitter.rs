//! EventEmitter Trait - abstraction for progress sinks
//!
//! Key types:
//! - `EventEmitter`: trait the engine emits through
//! - `NoopEmitter`: zero-cost no-op
//! - `ChannelEmitter`: bounded channel for a live consumer, never blocks the engine
//! - `TracingEmitter`: forwards progress records to `tracing`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::log::{Event, EventKind, EventLog, Level};

/// Anything that receives engine events
///
/// Implementations must not block: emission happens on the coordinator's
/// hot path.
pub trait EventEmitter: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: EventKind) -> u64;
}

impl EventEmitter for EventLog {
    fn emit(&self, kind: EventKind) -> u64 {
        EventLog::emit(self, kind)
    }
}

impl<E: EventEmitter + ?Sized> EventEmitter for Arc<E> {
    fn emit(&self, kind: EventKind) -> u64 {
        (**self).emit(kind)
    }
}

/// No-op emitter (zero allocation, always returns 0)
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _kind: EventKind) -> u64 {
        0
    }
}

/// Sends events over a bounded channel
///
/// When the consumer falls behind the event is dropped and counted.
#[derive(Debug)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<Event>,
    start_time: Instant,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = Self {
            tx,
            start_time: Instant::now(),
            next_id: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (emitter, rx)
    }

    /// Events lost because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        id
    }
}

/// Logs every event through `tracing` at a level matching its progress level
#[derive(Debug, Default)]
pub struct TracingEmitter {
    next_id: AtomicU64,
}

impl TracingEmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventEmitter for TracingEmitter {
    fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let node = kind.node_id().unwrap_or("-");
        let message = kind.message();
        match kind.level() {
            Level::Error => tracing::error!(event_id = id, node, "{message}"),
            Level::Warning => tracing::warn!(event_id = id, node, "{message}"),
            Level::Info | Level::Success => tracing::info!(event_id = id, node, "{message}"),
            Level::Debug => tracing::debug!(event_id = id, node, "{message}"),
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(id: &str) -> EventKind {
        EventKind::NodeSkipped {
            node_id: Arc::from(id),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // EventEmitter trait tests
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn event_emitter_trait_is_object_safe() {
        let log = EventLog::new();
        let emitter: Arc<dyn EventEmitter> = Arc::new(log.clone());
        emitter.emit(skipped("a"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn noop_emitter_returns_zero() {
        let emitter = NoopEmitter::new();
        assert_eq!(emitter.emit(skipped("a")), 0);
        assert_eq!(emitter.emit(skipped("b")), 0);
    }

    #[test]
    fn tracing_emitter_numbers_events() {
        let emitter = TracingEmitter::new();
        assert_eq!(emitter.emit(skipped("a")), 0);
        assert_eq!(emitter.emit(skipped("b")), 1);
    }

    // ═══════════════════════════════════════════════════════════════
    // ChannelEmitter
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn channel_emitter_delivers_in_order() {
        let (emitter, mut rx) = ChannelEmitter::new(8);
        emitter.emit(skipped("a"));
        emitter.emit(skipped("b"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind.node_id(), Some("a"));
        assert_eq!(second.kind.node_id(), Some("b"));
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn channel_emitter_drops_when_full() {
        let (emitter, mut rx) = ChannelEmitter::new(1);
        emitter.emit(skipped("a"));
        emitter.emit(skipped("b"));
        assert_eq!(emitter.dropped(), 1);
        assert_eq!(rx.recv().await.unwrap().kind.node_id(), Some("a"));
    }
}
