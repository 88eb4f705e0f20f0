//! Trait abstractions for the outside world.
//!
//! These traits enable dependency injection for testability and modularity.
//! The engine never talks to a device protocol directly: it reads live state
//! through [`SignalSource`] and actuates through [`DeviceCommandSink`].

use async_trait::async_trait;

use crate::devices::types::{DeviceCommand, DeviceState};
use crate::error::CommandResult;

/// Consumer of device commands.
///
/// Used by the action queue worker, which calls it strictly one command at a
/// time in FIFO order.
#[async_trait]
pub trait DeviceCommandSink: Send + Sync {
    /// Executes a single command against one or more devices.
    ///
    /// Implementations should return once the command has been handed to the
    /// device; completion is observed separately by polling [`SignalSource`].
    async fn execute(&self, command: &DeviceCommand) -> CommandResult<()>;
}

/// Read-only view of the outside world.
///
/// Calls must be cheap: they are made on every resolution cycle and every
/// poll tick of a wait-until action.
pub trait SignalSource: Send + Sync {
    /// Current state of a device, or `None` if it is unknown or stale.
    fn device_state(&self, device_id: &str) -> Option<DeviceState>;

    /// Whether anyone is home.
    fn zone_presence(&self) -> bool;

    /// Raw state string of a schedule entity, or `None` if it does not exist.
    fn schedule_state(&self, entity_id: &str) -> Option<String>;
}
