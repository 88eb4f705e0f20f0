//! AGS Core - multi-room audio orchestration.
//!
//! This crate decides, from live device signals, whether a house full of
//! speakers should be playing, which speaker leads the group, and which
//! speakers belong to it, then drives the devices there through an ordered
//! command queue.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`topology`]: Static room, device and source configuration
//! - [`engine`]: Pure decision logic (status, partition, primary election)
//! - [`services`]: Action queue, transition coordinator and orchestrator
//! - [`events`]: Event system for UI and sensor consumers
//! - [`state`]: Engine configuration and published state
//! - [`runtime`]: Task spawning abstraction
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate never talks to a device protocol. Hosts plug in:
//!
//! - [`SignalSource`](devices::SignalSource): Reading live device state
//! - [`DeviceCommandSink`](devices::DeviceCommandSink): Executing commands
//! - [`EventEmitter`](events::EventEmitter): Receiving domain events
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod devices;
pub mod engine;
pub mod error;
pub mod events;
pub mod runtime;
pub mod services;
pub mod state;
pub mod topology;
pub mod utils;

// Re-export commonly used types at the crate root
pub use devices::{
    DeviceCommand, DeviceCommandSink, DeviceState, LoggingCommandSink, PlayerState, SignalSource,
    Transport,
};
pub use engine::{PrimaryResult, SystemStatus};
pub use error::{AgsError, AgsResult, CommandError, ConfigError, ErrorCode};
pub use events::{
    ActionEvent, AgsEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter,
    NoopEventEmitter, StatusEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::{Config, PublishedState, ScheduleConfig};
pub use topology::{Device, DeviceType, OttDevice, Room, Source, Topology, TopologyConfig, TvMode};
pub use utils::now_millis;

// Re-export service types
pub use services::{ActionQueue, DiagnosticsReport, Orchestrator};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};
