//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, so tests can count events and hosts can pick a delivery path.

use super::{ActionEvent, StatusEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn publish(&self) {
///         self.emitter.emit_status(StatusEvent::StatusChanged { ... });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a derived-state change.
    fn emit_status(&self, event: StatusEvent);

    /// Emits an action queue outcome.
    fn emit_action(&self, event: ActionEvent);
}

/// No-op emitter for headless use or testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_status(&self, _event: StatusEvent) {}

    fn emit_action(&self, _event: ActionEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_status(&self, event: StatusEvent) {
        tracing::debug!(?event, "status_event");
    }

    fn emit_action(&self, event: ActionEvent) {
        tracing::debug!(?event, "action_event");
    }
}
