//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the queue,
//! the event bridge and the orchestrator are created and wired to the host's
//! [`SignalSource`] and [`DeviceCommandSink`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::devices::{DeviceCommandSink, SignalSource};
use crate::error::{AgsError, AgsResult};
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::runtime::TokioSpawner;
use crate::services::{ActionQueue, Orchestrator, OrchestratorDeps};
use crate::state::Config;
use crate::topology::Topology;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Owner of all orchestration state and the control surface.
    pub orchestrator: Arc<Orchestrator>,
    /// FIFO of device commands, drained by a single worker.
    pub queue: Arc<ActionQueue>,
    /// Event bridge for subscribers and an optional external emitter.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Starts the queue worker and the sync loop, then runs the first cycle.
    ///
    /// Call once, after any external emitter has been attached.
    pub fn start_background_tasks(&self) {
        self.queue
            .start_worker(&self.spawner, self.cancel_token.clone());
        self.orchestrator
            .start_sync_loop(self.cancel_token.clone());
        self.orchestrator.refresh();
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// Actions still pending are dropped.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        let pending = self.queue.pending();
        if pending > 0 {
            log::info!("[Bootstrap] Dropping {} pending action(s)", pending);
        }
        self.cancel_token.cancel();
        self.queue.wait_for_actions().await;

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all services with their dependencies.
///
/// Services are created in dependency order:
///
/// 1. Shared infrastructure (spawner, event bridge, cancellation token)
/// 2. Action queue (depends on sink, signals, event bridge)
/// 3. Orchestrator (depends on everything above)
///
/// # Errors
///
/// Returns [`AgsError::Configuration`] if `config` fails validation.
pub fn bootstrap_services(
    topology: Topology,
    config: Config,
    signals: Arc<dyn SignalSource>,
    sink: Arc<dyn DeviceCommandSink>,
) -> AgsResult<BootstrappedServices> {
    config
        .validate()
        .map_err(|e| AgsError::Configuration(e.to_string()))?;

    let spawner = TokioSpawner::current();
    let event_bridge = Arc::new(BroadcastEventBridge::new(EVENT_CHANNEL_CAPACITY));
    let cancel_token = CancellationToken::new();

    let queue = Arc::new(ActionQueue::new(
        sink,
        Arc::clone(&signals),
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        config.poll_interval(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        topology,
        config,
        OrchestratorDeps {
            signals,
            queue: Arc::clone(&queue),
            emitter: Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
            spawner: spawner.clone(),
        },
    ));

    Ok(BootstrappedServices {
        orchestrator,
        queue,
        event_bridge,
        spawner,
        cancel_token,
    })
}
