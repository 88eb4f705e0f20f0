//! The long-lived owner of all mutable orchestration state.
//!
//! Responsibilities:
//! - Running resolution cycles (snapshot, status, partition, primary)
//! - Dropping triggers that arrive while a cycle is running
//! - Publishing the derived state for readers
//! - Handing status/primary changes to the [`TransitionCoordinator`]
//! - The control surface (manual toggle, room switches, source selection)
//! - The aggregate player (transport, group volume)

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::action_queue::ActionQueue;
use super::diagnostics::DiagnosticsReport;
use super::transition_coordinator::{TransitionCoordinator, TransitionPlan};
use crate::devices::{DeviceCommand, SignalSource, Transport};
use crate::engine::{self, PrimaryResult, SignalSnapshot, SystemStatus};
use crate::error::{AgsError, AgsResult};
use crate::events::{EventEmitter, StatusEvent};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::state::{Config, PublishedState};
use crate::topology::{Topology, TV_SOURCE};
use crate::utils::now_millis;

/// State carried from one cycle to the next.
///
/// Held behind the cycle lock; whoever holds the lock is the running cycle.
#[derive(Debug)]
pub struct OrchestratorState {
    pub previous_status: SystemStatus,
    pub previous_primary: PrimaryResult,
    pub previous_active: Vec<String>,
    pub previous_inactive: Vec<String>,
    /// Schedule state seen by the previous cycle.
    pub schedule_on: Option<bool>,
    pub cycles: u64,
}

/// Named-source bookkeeping.
#[derive(Debug, Default)]
struct SourceState {
    current: Option<String>,
    /// Source in use before the system switched to TV.
    cached: Option<String>,
}

/// User-controlled inputs.
struct ControlState {
    manual_toggle: AtomicBool,
    room_switches: DashMap<String, bool>,
    sources: RwLock<SourceState>,
}

/// Dependencies for [`Orchestrator::new`].
pub struct OrchestratorDeps {
    pub signals: Arc<dyn SignalSource>,
    pub queue: Arc<ActionQueue>,
    pub emitter: Arc<dyn EventEmitter>,
    pub spawner: TokioSpawner,
}

/// Runs resolution cycles and exposes the control and read surfaces.
pub struct Orchestrator {
    topology: RwLock<Arc<Topology>>,
    config: Config,
    signals: Arc<dyn SignalSource>,
    control: ControlState,
    state: Mutex<OrchestratorState>,
    published: RwLock<Arc<PublishedState>>,
    queue: Arc<ActionQueue>,
    coordinator: Arc<TransitionCoordinator>,
    emitter: Arc<dyn EventEmitter>,
    spawner: TokioSpawner,
    recheck_scheduled: AtomicBool,
    trigger: Notify,
}

impl Orchestrator {
    pub fn new(topology: Topology, config: Config, deps: OrchestratorDeps) -> Self {
        let coordinator = Arc::new(TransitionCoordinator::new(
            Arc::clone(&deps.queue),
            Arc::clone(&deps.signals),
            config.clone(),
        ));
        let sources = SourceState {
            current: topology.fallback_source().map(|s| s.name.clone()),
            cached: None,
        };
        let published = PublishedState::initial(&topology, config.default_on);
        let state = OrchestratorState {
            previous_status: published.status.clone(),
            previous_primary: PrimaryResult::NoneActive,
            previous_active: Vec::new(),
            previous_inactive: Vec::new(),
            schedule_on: None,
            cycles: 0,
        };

        Self {
            topology: RwLock::new(Arc::new(topology)),
            control: ControlState {
                manual_toggle: AtomicBool::new(config.default_on),
                room_switches: DashMap::new(),
                sources: RwLock::new(sources),
            },
            config,
            signals: deps.signals,
            state: Mutex::new(state),
            published: RwLock::new(Arc::new(published)),
            queue: deps.queue,
            coordinator,
            emitter: deps.emitter,
            spawner: deps.spawner,
            recheck_scheduled: AtomicBool::new(false),
            trigger: Notify::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read surface
    // ─────────────────────────────────────────────────────────────────────────

    /// Last published derived state.
    pub fn published(&self) -> Arc<PublishedState> {
        Arc::clone(&self.published.read())
    }

    pub fn topology(&self) -> Arc<Topology> {
        Arc::clone(&self.topology.read())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }

    pub fn manual_toggle(&self) -> bool {
        self.control.manual_toggle.load(Ordering::SeqCst)
    }

    /// Returns true if the room's activation switch is on.
    pub fn room_switch(&self, room: &str) -> bool {
        self.control
            .room_switches
            .get(room)
            .is_some_and(|entry| *entry.value())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control surface
    // ─────────────────────────────────────────────────────────────────────────

    /// Turns the whole system on or off.
    pub fn set_manual_toggle(self: &Arc<Self>, on: bool) {
        log::info!("[Orchestrator] Manual toggle -> {}", on);
        self.control.manual_toggle.store(on, Ordering::SeqCst);
        self.refresh();
    }

    /// Flips a room's activation switch.
    ///
    /// # Errors
    ///
    /// Returns [`AgsError::UnknownRoom`] if no such room is configured.
    pub fn set_room_active(self: &Arc<Self>, room: &str, active: bool) -> AgsResult<()> {
        if self.topology().room(room).is_none() {
            return Err(AgsError::UnknownRoom(room.to_string()));
        }
        log::info!("[Orchestrator] Room '{}' -> {}", room, active);
        self.control.room_switches.insert(room.to_string(), active);
        self.refresh();
        Ok(())
    }

    /// Selects a named source and starts it on the current primary.
    ///
    /// While the system is in TV mode a music source is only remembered; it
    /// starts once the TV turns off.
    ///
    /// # Errors
    ///
    /// Returns [`AgsError::UnknownSource`] if the name is neither "TV" nor in
    /// the catalog.
    pub fn select_source(self: &Arc<Self>, name: &str) -> AgsResult<()> {
        let topology = self.topology();
        if !topology.is_selectable_source(name) {
            return Err(AgsError::UnknownSource(name.to_string()));
        }
        {
            let mut sources = self.control.sources.write();
            if self.published().status == SystemStatus::OnTv && name != TV_SOURCE {
                log::info!("[Orchestrator] Source -> {} (after TV)", name);
                sources.cached = Some(name.to_string());
                return Ok(());
            }
            log::info!("[Orchestrator] Source -> {}", name);
            sources.current = Some(name.to_string());
        }

        // A spawned transition starts the current source itself.
        if self.run_cycle() == Some(true) {
            return Ok(());
        }
        let published = self.published();
        let target = published
            .primary
            .device_id()
            .or(published.preferred_primary.as_deref());
        if published.status.is_playing() {
            self.coordinator
                .apply_source(target, &published.status, Some(name), &topology);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Aggregate player
    // ─────────────────────────────────────────────────────────────────────────

    /// Sends a transport command to the speaker leading the group.
    ///
    /// # Errors
    ///
    /// Returns [`AgsError::NoPrimary`] when no speaker leads and none is
    /// preferred.
    pub fn transport(&self, transport: Transport) -> AgsResult<()> {
        let published = self.published();
        let target = published
            .primary
            .device_id()
            .or(published.preferred_primary.as_deref())
            .ok_or(AgsError::NoPrimary)?;
        log::info!("[Orchestrator] {:?} -> {}", transport, target);
        self.queue.enqueue(transport.command(target));
        Ok(())
    }

    /// Sets the volume of every active speaker.
    ///
    /// # Errors
    ///
    /// Returns [`AgsError::InvalidVolume`] for a level outside `0.0..=1.0`.
    pub fn set_volume(&self, level: f32) -> AgsResult<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(AgsError::InvalidVolume(level));
        }
        let targets = self.published().active_devices.clone();
        if targets.is_empty() {
            log::debug!("[Orchestrator] No active speakers, volume {} ignored", level);
            return Ok(());
        }
        log::info!("[Orchestrator] Volume -> {} on {} speaker(s)", level, targets.len());
        self.queue.enqueue(DeviceCommand::VolumeSet { targets, level });
        Ok(())
    }

    /// Mean volume over the active speakers that report one, or 0.
    pub fn volume_level(&self) -> f32 {
        let levels: Vec<f32> = self
            .published()
            .active_devices
            .iter()
            .filter_map(|id| self.signals.device_state(id)?.volume_level)
            .collect();
        if levels.is_empty() {
            return 0.0;
        }
        levels.iter().sum::<f32>() / levels.len() as f32
    }

    /// Collects a diagnostics report.
    pub fn run_diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport::collect(
            &self.topology(),
            &self.config,
            self.signals.as_ref(),
            &self.published(),
            self.queue.pending(),
        )
    }

    /// Swaps in a new topology and recomputes.
    ///
    /// Room switches for rooms that no longer exist are forgotten.
    pub fn replace_topology(self: &Arc<Self>, topology: Topology) {
        self.control
            .room_switches
            .retain(|room, _| topology.room(room).is_some());
        {
            let mut sources = self.control.sources.write();
            let known = |name: &Option<String>| {
                name.as_deref()
                    .is_some_and(|n| topology.is_selectable_source(n))
            };
            if !known(&sources.current) {
                sources.current = topology.fallback_source().map(|s| s.name.clone());
            }
            if !known(&sources.cached) {
                sources.cached = None;
            }
        }
        log::info!(
            "[Orchestrator] Topology replaced ({} rooms, {} sources)",
            topology.rooms().len(),
            topology.sources().len()
        );
        *self.topology.write() = Arc::new(topology);
        self.refresh();
    }

    /// Runs a cycle now. Returns false if one was already running.
    pub fn refresh(self: &Arc<Self>) -> bool {
        self.recompute()
    }

    /// Asks the sync loop to recompute soon (device state changed).
    pub fn notify_changed(&self) {
        self.trigger.notify_one();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one resolution cycle.
    ///
    /// A cycle that finds another one in progress returns false immediately;
    /// the trigger is dropped, not queued.
    pub fn recompute(self: &Arc<Self>) -> bool {
        self.run_cycle().is_some()
    }

    /// Runs one cycle. Returns `None` if it was dropped, otherwise whether a
    /// transition was spawned.
    fn run_cycle(self: &Arc<Self>) -> Option<bool> {
        let Some(mut state) = self.state.try_lock() else {
            log::debug!("[Orchestrator] Cycle already running, dropping trigger");
            return None;
        };

        let topology = self.topology();
        let room_switches: HashSet<String> = self
            .control
            .room_switches
            .iter()
            .filter(|entry| *entry.value())
            .map(|entry| entry.key().clone())
            .collect();
        let snapshot = SignalSnapshot::capture(
            &topology,
            self.signals.as_ref(),
            &self.config,
            self.control.manual_toggle.load(Ordering::SeqCst),
            &room_switches,
        );
        let evaluation = engine::evaluate(&topology, &self.config, &snapshot, state.schedule_on);

        if let Some(toggle) = evaluation.resolution.toggle_adjustment {
            log::info!(
                "[Orchestrator] Schedule turned {}, manual toggle -> {}",
                if toggle { "on" } else { "off" },
                toggle
            );
            self.control.manual_toggle.store(toggle, Ordering::SeqCst);
        }
        state.schedule_on = evaluation.resolution.schedule_on;

        let status = evaluation.status().clone();
        let primary = evaluation.primary.clone();
        let current_source = self.track_tv_source(&state.previous_status, &status);
        state.cycles += 1;

        let plan = TransitionPlan {
            topology: Arc::clone(&topology),
            from_status: state.previous_status.clone(),
            to_status: status.clone(),
            primary: primary.clone(),
            preferred_primary: evaluation.preferred_primary.clone(),
            active_devices: evaluation.partition.active.clone(),
            inactive_devices: evaluation.partition.inactive.clone(),
            current_source: current_source.clone(),
        };
        let published = PublishedState::from_evaluation(
            evaluation,
            current_source,
            self.control.manual_toggle.load(Ordering::SeqCst),
            state.cycles,
            now_millis(),
        );
        *self.published.write() = Arc::new(published);

        let status_changed = status != state.previous_status;
        let primary_changed = primary != state.previous_primary;
        let partition_changed = plan.active_devices != state.previous_active
            || plan.inactive_devices != state.previous_inactive;
        if status_changed {
            log::info!(
                "[Orchestrator] Status {} -> {}",
                state.previous_status,
                status
            );
            self.emitter.emit_status(StatusEvent::StatusChanged {
                from: state.previous_status.clone(),
                to: status.clone(),
                timestamp: now_millis(),
            });
        }
        if primary_changed {
            log::info!(
                "[Orchestrator] Primary {} -> {}",
                state.previous_primary,
                primary
            );
            self.emitter.emit_status(StatusEvent::PrimaryChanged {
                from: state.previous_primary.device_id().map(str::to_string),
                to: primary.device_id().map(str::to_string),
                timestamp: now_millis(),
            });
        }
        if partition_changed && !status_changed {
            log::info!(
                "[Orchestrator] Active speakers -> {:?}",
                plan.active_devices
            );
        }
        let active = plan.active_devices.clone();
        let inactive = plan.inactive_devices.clone();
        let spawned = status_changed || primary_changed || partition_changed;
        if spawned {
            let coordinator = Arc::clone(&self.coordinator);
            self.spawner.spawn(async move {
                coordinator.run(plan).await;
            });
        }

        if status.is_playing() && primary == PrimaryResult::NoneActive {
            self.schedule_recheck();
        }

        state.previous_status = status;
        state.previous_primary = primary;
        state.previous_active = active;
        state.previous_inactive = inactive;
        Some(spawned)
    }

    /// Applies the TV source cache for a status change and returns the
    /// current source.
    ///
    /// Leaving TV mode for any other status restores the cached source.
    fn track_tv_source(&self, from: &SystemStatus, to: &SystemStatus) -> Option<String> {
        let mut sources = self.control.sources.write();
        if *to == SystemStatus::OnTv && *from != SystemStatus::OnTv {
            sources.cached = sources.current.take();
            sources.current = Some(TV_SOURCE.to_string());
        } else if *from == SystemStatus::OnTv && *to != SystemStatus::OnTv {
            if let Some(cached) = sources.cached.take() {
                sources.current = Some(cached);
            }
        }
        sources.current.clone()
    }

    /// Recomputes once more after `primary_delay`, for speakers that were
    /// still starting up when the cycle ran.
    fn schedule_recheck(self: &Arc<Self>) {
        if self.recheck_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        let delay = self.config.primary_delay();
        self.spawner.spawn(async move {
            tokio::time::sleep(delay).await;
            this.recheck_scheduled.store(false, Ordering::SeqCst);
            log::debug!("[Orchestrator] Re-checking primary");
            this.recompute();
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Spawns the loop that recomputes on every interval tick and on
    /// [`notify_changed`](Self::notify_changed).
    pub fn start_sync_loop(self: &Arc<Self>, cancel: CancellationToken) {
        let this = Arc::clone(self);
        let period = (self.config.interval_sync_secs > 0)
            .then(|| Duration::from_secs(self.config.interval_sync_secs));

        self.spawner.spawn(async move {
            let mut interval = period.map(tokio::time::interval);
            log::info!("[Orchestrator] Sync loop started (interval: {:?})", period);
            loop {
                let tick = async {
                    match interval.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = this.trigger.notified() => {}
                    _ = tick => {}
                }
                this.recompute();
            }
            log::info!("[Orchestrator] Sync loop stopped");
        });
    }
}
