//! Bridge implementation that maps domain events to a broadcast channel.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between domain services
//! and whoever wants to observe them (a UI layer, the server's log sink).

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{ActionEvent, AgsEvent, StatusEvent};

/// Bridges domain events to a `tokio::sync::broadcast` channel.
///
/// Also forwards to an optional external emitter that can be set after
/// construction.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<AgsEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives every event as well.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<AgsEvent> {
        self.tx.subscribe()
    }
}

/// Generates an [`EventEmitter`] method that forwards to the external emitter
/// (if set) and then sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref emitter) = *self.external_emitter.read() {
                emitter.$method(event.clone());
            }
            if let Err(e) = self.tx.send(AgsEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_status, StatusEvent, Status);
    impl_emit!(emit_action, ActionEvent, Action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventEmitter;

    #[tokio::test]
    async fn forwards_to_subscribers_and_external_emitter() {
        let bridge = BroadcastEventBridge::new(8);
        let external = Arc::new(RecordingEventEmitter::default());
        bridge.set_external_emitter(external.clone());
        let mut rx = bridge.subscribe();

        bridge.emit_action(ActionEvent::TimedOut {
            condition: "ungrouped".into(),
            devices: vec![],
            waited_ms: 5000,
            timestamp: 0,
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            AgsEvent::Action(ActionEvent::TimedOut { .. })
        ));
        assert_eq!(external.actions.lock().len(), 1);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let bridge = BroadcastEventBridge::new(1);
        bridge.emit_status(StatusEvent::PrimaryChanged {
            from: None,
            to: None,
            timestamp: 0,
        });
    }
}
