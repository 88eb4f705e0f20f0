//! Event system for UI and sensor consumers.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`BroadcastEventBridge`] for fan-out to any number of subscribers
//! - Event types for orchestration status and action execution

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

#[cfg(test)]
pub(crate) use emitter::tests::RecordingEventEmitter;

use serde::Serialize;

use crate::engine::SystemStatus;

/// Events broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum AgsEvent {
    /// Changes of the derived system state.
    Status(StatusEvent),

    /// Outcomes of queued actions worth surfacing.
    Action(ActionEvent),
}

/// Events emitted when a resolution cycle changes the derived state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatusEvent {
    /// System status changed between two cycles.
    StatusChanged {
        from: SystemStatus,
        to: SystemStatus,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Elected primary device changed between two cycles.
    PrimaryChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events emitted by the action queue worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionEvent {
    /// The command sink returned an error. The queue moved on.
    Failed {
        command: String,
        targets: Vec<String>,
        error: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A wait-until action reached its timeout before its condition held.
    TimedOut {
        condition: String,
        devices: Vec<String>,
        #[serde(rename = "waitedMs")]
        waited_ms: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<StatusEvent> for AgsEvent {
    fn from(event: StatusEvent) -> Self {
        AgsEvent::Status(event)
    }
}

impl From<ActionEvent> for AgsEvent {
    fn from(event: ActionEvent) -> Self {
        AgsEvent::Action(event)
    }
}
