//! Transfer event emitter port.
//!
//! This port abstracts event emission, allowing the transfer manager to
//! report lifecycle changes without coupling to UI or notification plumbing.

use tokio::sync::broadcast;

use crate::transfer::TransferEvent;

/// Port for emitting transfer events.
///
/// Implementations must not block; they buffer or drop.
pub trait TransferEventEmitterPort: Send + Sync {
    /// Emit a transfer event.
    fn emit(&self, event: TransferEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn TransferEventEmitterPort>` without
    /// requiring the underlying type to implement Clone.
    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort>;
}

/// A no-op emitter for tests and contexts without a UI.
#[derive(Debug, Clone, Default)]
pub struct NoopTransferEmitter;

impl NoopTransferEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransferEventEmitterPort for NoopTransferEmitter {
    fn emit(&self, _event: TransferEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort> {
        Box::new(self.clone())
    }
}

/// Emitter that fans events out over a `tokio` broadcast channel.
///
/// Slow receivers lag and lose old events rather than blocking transfers.
#[derive(Debug, Clone)]
pub struct BroadcastTransferEmitter {
    tx: broadcast::Sender<TransferEvent>,
}

impl BroadcastTransferEmitter {
    /// Create an emitter buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.tx.subscribe()
    }
}

impl TransferEventEmitterPort for BroadcastTransferEmitter {
    fn emit(&self, event: TransferEvent) {
        // Errors only mean there are no receivers right now
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferId;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn TransferEventEmitterPort> = Arc::new(NoopTransferEmitter::new());
        emitter.emit(TransferEvent::ReviewCountChanged { count: 1 });
        let _boxed = emitter.clone_box();
    }

    #[tokio::test]
    async fn test_broadcast_emitter_delivers() {
        let emitter = BroadcastTransferEmitter::new(8);
        let mut rx = emitter.subscribe();

        emitter.emit(TransferEvent::Removed {
            id: TransferId::from_url("http://a/b"),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.transfer_id(),
            Some(&TransferId::from_url("http://a/b"))
        );
    }

    #[test]
    fn test_broadcast_without_receivers_is_silent() {
        let emitter = BroadcastTransferEmitter::new(1);
        emitter.emit(TransferEvent::ReviewCountChanged { count: 0 });
    }
}
