//! Device-facing seams: live state, commands, and the traits that carry them.

mod sink;
mod traits;
mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use sink::LoggingCommandSink;
pub use traits::{DeviceCommandSink, SignalSource};
pub use types::{DeviceCommand, DeviceState, PlayerState, Transport};
