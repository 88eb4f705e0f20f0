//! Command sequencing on status and primary changes.
//!
//! The coordinator turns a `(status, primary)` change into an ordered list of
//! actions on the [`ActionQueue`]. Runs are serialized: a second transition
//! waits until the first one has finished planning and observed its results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::action_queue::{Action, ActionQueue, WaitCondition};
use crate::devices::{DeviceCommand, SignalSource};
use crate::engine::{PrimaryResult, SystemStatus};
use crate::state::Config;
use crate::topology::{Topology, TV_SOURCE};
use crate::utils::poll_until;

/// Everything a transition needs, captured when the cycle that caused it ran.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub topology: Arc<Topology>,
    pub from_status: SystemStatus,
    pub to_status: SystemStatus,
    pub primary: PrimaryResult,
    pub preferred_primary: Option<String>,
    pub active_devices: Vec<String>,
    pub inactive_devices: Vec<String>,
    pub current_source: Option<String>,
}

/// Clears the select-source flag when dropped.
struct SelectingGuard<'a>(&'a AtomicBool);

impl Drop for SelectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Emits grouping and source-selection sequences into the action queue.
pub struct TransitionCoordinator {
    queue: Arc<ActionQueue>,
    signals: Arc<dyn SignalSource>,
    config: Config,
    run_lock: Mutex<()>,
    selecting: AtomicBool,
}

impl TransitionCoordinator {
    pub fn new(queue: Arc<ActionQueue>, signals: Arc<dyn SignalSource>, config: Config) -> Self {
        Self {
            queue,
            signals,
            config,
            run_lock: Mutex::new(()),
            selecting: AtomicBool::new(false),
        }
    }

    /// Plans and enqueues the actions for one transition.
    ///
    /// Returns the number of actions enqueued.
    pub async fn run(&self, plan: TransitionPlan) -> usize {
        let _running = self.run_lock.lock().await;
        log::info!(
            "[Transition] {} -> {} (primary: {})",
            plan.from_status,
            plan.to_status,
            plan.primary
        );

        match plan.to_status {
            SystemStatus::Off => self.shut_down(&plan),
            SystemStatus::On | SystemStatus::OnTv => self.bring_up(&plan).await,
            SystemStatus::Override | SystemStatus::Startup(_) => 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // OFF
    // ─────────────────────────────────────────────────────────────────────────

    fn shut_down(&self, plan: &TransitionPlan) -> usize {
        let speakers = plan.topology.speaker_ids();
        if speakers.is_empty() {
            return 0;
        }

        let mut actions = vec![
            Action::Command(DeviceCommand::Unjoin {
                targets: speakers.clone(),
            }),
            Action::WaitUntil {
                devices: speakers,
                condition: WaitCondition::Ungrouped,
                timeout: self.config.ungroup_timeout(),
            },
        ];
        for room in plan.topology.rooms() {
            let targets: Vec<String> = room.speakers().map(|d| d.device_id.clone()).collect();
            if targets.is_empty() {
                continue;
            }
            actions.push(Action::Command(self.park(room.has_tv(), targets)));
        }
        self.submit(actions)
    }

    /// Command that leaves a speaker that is no longer wanted in a sane state.
    fn park(&self, tv_room: bool, targets: Vec<String>) -> DeviceCommand {
        if tv_room && !self.config.disable_tv_source {
            DeviceCommand::SelectSource {
                targets,
                source: TV_SOURCE.to_string(),
            }
        } else {
            DeviceCommand::Stop { targets }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // ON / ON_TV
    // ─────────────────────────────────────────────────────────────────────────

    async fn bring_up(&self, plan: &TransitionPlan) -> usize {
        let Some(primary) = Self::calculated_primary(plan) else {
            return self.park_strays(plan);
        };

        let live_group = self
            .signals
            .device_state(&primary)
            .map(|s| s.group_members)
            .unwrap_or_default();
        let missing: Vec<String> = plan
            .active_devices
            .iter()
            .filter(|id| **id != primary && !live_group.contains(id))
            .cloned()
            .collect();
        let extra: Vec<String> = live_group
            .iter()
            .filter(|id| **id != primary && !plan.active_devices.contains(id))
            .cloned()
            .collect();

        let mut actions = Vec::new();
        if !missing.is_empty() {
            actions.push(Action::Command(DeviceCommand::Join {
                leader: primary.clone(),
                members: missing.clone(),
            }));
            actions.push(Action::Delay(self.config.command_spacing()));
        }
        for id in extra {
            let tv_room = plan.topology.in_tv_room(&id);
            actions.push(Action::Command(DeviceCommand::Unjoin {
                targets: vec![id.clone()],
            }));
            actions.push(Action::Command(self.park(tv_room, vec![id])));
            actions.push(Action::Delay(self.config.command_spacing()));
        }
        let mut enqueued = self.submit(actions);

        if enqueued > 0 {
            self.queue.wait_for_actions().await;
        }
        if !missing.is_empty() {
            let grouped = WaitCondition::GroupedUnder {
                leader: primary.clone(),
                members: missing,
            };
            let signals = self.signals.as_ref();
            let outcome = poll_until(
                self.config.poll_interval(),
                self.config.group_timeout(),
                || grouped.holds(&[], signals),
            )
            .await;
            if !outcome.is_satisfied() {
                log::warn!("[Transition] {} did not finish grouping, continuing", primary);
            }
        }

        enqueued += match plan.to_status {
            SystemStatus::OnTv => self.select_tv(&primary),
            _ => self.apply_source(
                Some(&primary),
                &plan.to_status,
                plan.current_source.as_deref(),
                &plan.topology,
            ),
        };
        enqueued
    }

    /// Primary to group under: the preferred one when entering TV mode with a
    /// different speaker in the lead, otherwise the elected one, otherwise the
    /// preferred one.
    fn calculated_primary(plan: &TransitionPlan) -> Option<String> {
        let elected = plan.primary.device_id();
        if plan.to_status == SystemStatus::OnTv && plan.from_status != SystemStatus::OnTv {
            if let Some(ref preferred) = plan.preferred_primary {
                if elected != Some(preferred.as_str()) {
                    return Some(preferred.clone());
                }
            }
        }
        elected
            .map(str::to_string)
            .or_else(|| plan.preferred_primary.clone())
    }

    /// Nothing to lead: pull playing speakers out of inactive rooms.
    fn park_strays(&self, plan: &TransitionPlan) -> usize {
        let strays: Vec<String> = plan
            .inactive_devices
            .iter()
            .filter(|id| {
                self.signals
                    .device_state(id)
                    .is_some_and(|s| s.state.is_engaged())
            })
            .cloned()
            .collect();
        if strays.is_empty() {
            log::debug!("[Transition] No primary and no strays, nothing to do");
            return 0;
        }

        let mut actions = vec![Action::Command(DeviceCommand::Unjoin {
            targets: strays.clone(),
        })];
        for id in strays {
            let tv_room = plan.topology.in_tv_room(&id);
            actions.push(Action::Command(self.park(tv_room, vec![id])));
        }
        self.submit(actions)
    }

    fn select_tv(&self, primary: &str) -> usize {
        let Some(state) = self.signals.device_state(primary) else {
            return 0;
        };
        if !state.source_list.iter().any(|s| s == TV_SOURCE) || state.source_is(TV_SOURCE) {
            return 0;
        }
        self.submit([
            Action::Command(DeviceCommand::SelectSource {
                targets: vec![primary.to_string()],
                source: TV_SOURCE.to_string(),
            }),
            Action::WaitUntil {
                devices: vec![primary.to_string()],
                condition: WaitCondition::SourceSelected(TV_SOURCE.to_string()),
                timeout: self.config.group_timeout(),
            },
        ])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Source selection
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts the named source on `target`.
    ///
    /// Falls back to the catalog default when no source is named. Skips when
    /// the target is already playing the source's content off its TV input.
    /// Overlapping calls are dropped. Returns the number of actions enqueued.
    pub fn apply_source(
        &self,
        target: Option<&str>,
        status: &SystemStatus,
        source_name: Option<&str>,
        topology: &Topology,
    ) -> usize {
        let Some(target) = target else {
            return 0;
        };
        if *status == SystemStatus::Off {
            return 0;
        }
        if self
            .selecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("[Transition] Source selection already running, skipping");
            return 0;
        }
        let _selecting = SelectingGuard(&self.selecting);

        let name = source_name
            .map(str::to_string)
            .or_else(|| topology.fallback_source().map(|s| s.name.clone()));
        let Some(name) = name else {
            log::debug!("[Transition] No source configured");
            return 0;
        };

        if name == TV_SOURCE {
            return self.submit([Action::Command(DeviceCommand::SelectSource {
                targets: vec![target.to_string()],
                source: TV_SOURCE.to_string(),
            })]);
        }

        let Some(source) = topology.source(&name) else {
            log::warn!("[Transition] Unknown source '{}'", name);
            return 0;
        };
        let content_id = source.media_content_id();
        if self
            .signals
            .device_state(target)
            .is_some_and(|s| !s.source_is(TV_SOURCE) && s.media_contains(&content_id))
        {
            log::debug!("[Transition] {} already playing '{}'", target, name);
            return 0;
        }

        self.submit([Action::Command(DeviceCommand::PlayMedia {
            target: target.to_string(),
            content_id,
            content_type: source.media_content_type.clone(),
        })])
    }

    fn submit(&self, actions: impl IntoIterator<Item = Action>) -> usize {
        let actions: Vec<Action> = actions.into_iter().collect();
        let count = actions.len();
        self.queue.enqueue_all(actions);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::test_fixtures::*;
    use crate::devices::{DeviceState, PlayerState};
    use crate::events::{ActionEvent, NoopEventEmitter, RecordingEventEmitter};
    use crate::runtime::TokioSpawner;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        signals: Arc<FakeSignals>,
        sink: Arc<RecordingSink>,
        queue: Arc<ActionQueue>,
        coordinator: TransitionCoordinator,
        _cancel: CancellationToken,
    }

    fn harness(config: Config) -> Harness {
        let signals = Arc::new(FakeSignals::new());
        let sink = Arc::new(RecordingSink::mirroring(signals.clone()));
        let queue = Arc::new(ActionQueue::new(
            sink.clone(),
            signals.clone(),
            Arc::new(NoopEventEmitter),
            config.poll_interval(),
        ));
        let cancel = CancellationToken::new();
        queue.start_worker(&TokioSpawner::current(), cancel.clone());
        let coordinator = TransitionCoordinator::new(queue.clone(), signals.clone(), config);
        Harness {
            signals,
            sink,
            queue,
            coordinator,
            _cancel: cancel,
        }
    }

    fn house() -> Arc<Topology> {
        Arc::new(topology(vec![
            room(
                "Living",
                vec![
                    speaker("media_player.living", 1),
                    speaker("media_player.living_sub", 2),
                    tv("media_player.tv", 5),
                ],
            ),
            room("Kitchen", vec![speaker("media_player.kitchen", 3)]),
        ]))
    }

    fn plan(topology: Arc<Topology>, from: SystemStatus, to: SystemStatus) -> TransitionPlan {
        TransitionPlan {
            topology,
            from_status: from,
            to_status: to,
            primary: PrimaryResult::NoneActive,
            preferred_primary: None,
            active_devices: vec![],
            inactive_devices: vec![],
            current_source: Some("Default".into()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn off_ungroups_then_parks_each_room() {
        let h = harness(Config::default());
        let topology = house();
        h.signals.set_device("media_player.living", leading("media_player.living", &["media_player.kitchen"]));
        h.signals.set_device("media_player.kitchen", leading("media_player.living", &["media_player.kitchen"]));

        h.coordinator
            .run(plan(topology, SystemStatus::On, SystemStatus::Off))
            .await;
        h.queue.wait_for_actions().await;

        let calls = h.sink.calls();
        assert_eq!(h.sink.verbs(), vec!["unjoin", "select_source", "stop"]);
        assert_eq!(
            calls[1],
            DeviceCommand::SelectSource {
                targets: vec!["media_player.living".into(), "media_player.living_sub".into()],
                source: TV_SOURCE.into(),
            }
        );
        assert_eq!(
            calls[2],
            DeviceCommand::Stop {
                targets: vec!["media_player.kitchen".into()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn off_stops_tv_rooms_when_tv_source_disabled() {
        let h = harness(Config {
            disable_tv_source: true,
            ..Config::default()
        });
        h.coordinator
            .run(plan(house(), SystemStatus::On, SystemStatus::Off))
            .await;
        h.queue.wait_for_actions().await;
        assert_eq!(h.sink.verbs(), vec!["unjoin", "stop", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn on_joins_missing_members_then_plays_source() {
        let h = harness(Config::default());
        h.signals.set_device("media_player.living", solo("media_player.living"));
        h.signals.set_device("media_player.living_sub", solo("media_player.living_sub"));

        let mut p = plan(house(), SystemStatus::Off, SystemStatus::On);
        p.primary = PrimaryResult::Resolved("media_player.living".into());
        p.preferred_primary = Some("media_player.living".into());
        p.active_devices = vec!["media_player.living".into(), "media_player.living_sub".into()];
        h.coordinator.run(p).await;
        h.queue.wait_for_actions().await;

        let calls = h.sink.calls();
        assert_eq!(
            calls[0],
            DeviceCommand::Join {
                leader: "media_player.living".into(),
                members: vec!["media_player.living_sub".into()],
            }
        );
        assert_eq!(
            calls[1],
            DeviceCommand::PlayMedia {
                target: "media_player.living".into(),
                content_id: "FV:1".into(),
                content_type: "favorite_item_id".into(),
            }
        );
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn on_removes_members_outside_active_set() {
        let h = harness(Config::default());
        let group = ["media_player.kitchen"];
        h.signals.set_device("media_player.living", leading("media_player.living", &group));
        h.signals.set_device("media_player.kitchen", leading("media_player.living", &group));
        h.signals.update_device("media_player.living", |s| {
            s.media_content_id = Some("FV:1".into())
        });

        let mut p = plan(house(), SystemStatus::On, SystemStatus::On);
        p.primary = PrimaryResult::Resolved("media_player.living".into());
        p.active_devices = vec!["media_player.living".into()];
        h.coordinator.run(p).await;
        h.queue.wait_for_actions().await;

        assert_eq!(
            h.sink.calls(),
            vec![
                DeviceCommand::Unjoin {
                    targets: vec!["media_player.kitchen".into()]
                },
                DeviceCommand::Stop {
                    targets: vec!["media_player.kitchen".into()]
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn on_tv_selects_tv_input_on_primary() {
        let h = harness(Config::default());
        h.signals.set_device("media_player.living", solo("media_player.living"));

        let mut p = plan(house(), SystemStatus::On, SystemStatus::OnTv);
        p.primary = PrimaryResult::Resolved("media_player.living".into());
        p.preferred_primary = Some("media_player.living".into());
        p.active_devices = vec!["media_player.living".into()];
        h.coordinator.run(p).await;
        h.queue.wait_for_actions().await;

        assert_eq!(
            h.sink.calls(),
            vec![DeviceCommand::SelectSource {
                targets: vec!["media_player.living".into()],
                source: TV_SOURCE.into(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn on_tv_waits_for_tv_input_to_be_reported() {
        let signals = Arc::new(FakeSignals::new());
        signals.set_device("media_player.living", solo("media_player.living"));
        // Sink that never reports the new source back.
        let sink = Arc::new(RecordingSink::new());
        let emitter = Arc::new(RecordingEventEmitter::default());
        let config = Config::default();
        let queue = Arc::new(ActionQueue::new(
            sink.clone(),
            signals.clone(),
            emitter.clone(),
            config.poll_interval(),
        ));
        let cancel = CancellationToken::new();
        queue.start_worker(&TokioSpawner::current(), cancel.clone());
        let coordinator = TransitionCoordinator::new(queue.clone(), signals.clone(), config);

        let mut p = plan(house(), SystemStatus::On, SystemStatus::OnTv);
        p.primary = PrimaryResult::Resolved("media_player.living".into());
        p.active_devices = vec!["media_player.living".into()];
        assert_eq!(coordinator.run(p).await, 2);
        queue.wait_for_actions().await;

        assert_eq!(sink.verbs(), vec!["select_source"]);
        let actions = emitter.actions.lock();
        assert!(matches!(
            actions.as_slice(),
            [ActionEvent::TimedOut { condition, .. }] if condition == "source_selected"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn entering_tv_mode_prefers_preferred_primary() {
        let h = harness(Config::default());
        h.signals.set_device("media_player.kitchen", solo("media_player.kitchen"));
        h.signals.set_device("media_player.living", DeviceState::new(PlayerState::Idle));

        let mut p = plan(house(), SystemStatus::On, SystemStatus::OnTv);
        p.primary = PrimaryResult::Resolved("media_player.kitchen".into());
        p.preferred_primary = Some("media_player.living".into());
        p.active_devices = vec!["media_player.living".into(), "media_player.kitchen".into()];
        h.coordinator.run(p).await;
        h.queue.wait_for_actions().await;

        assert_eq!(
            h.sink.calls()[0],
            DeviceCommand::Join {
                leader: "media_player.living".into(),
                members: vec!["media_player.kitchen".into()],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_primary_parks_strays_only() {
        let h = harness(Config::default());
        h.signals.set_device("media_player.kitchen", solo("media_player.kitchen"));
        h.signals.set_device("media_player.living", DeviceState::new(PlayerState::Paused));

        let mut p = plan(house(), SystemStatus::Off, SystemStatus::On);
        p.inactive_devices = vec!["media_player.living".into(), "media_player.kitchen".into()];
        assert_eq!(h.coordinator.run(p).await, 2);
        h.queue.wait_for_actions().await;

        assert_eq!(
            h.sink.calls(),
            vec![
                DeviceCommand::Unjoin {
                    targets: vec!["media_player.kitchen".into()]
                },
                DeviceCommand::Stop {
                    targets: vec!["media_player.kitchen".into()]
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn override_transition_enqueues_nothing() {
        let h = harness(Config::default());
        let count = h
            .coordinator
            .run(plan(house(), SystemStatus::On, SystemStatus::Override))
            .await;
        assert_eq!(count, 0);
        assert_eq!(h.queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_source_skips_content_already_playing() {
        let h = harness(Config::default());
        let topology = house();
        h.signals.set_device(
            "media_player.living",
            DeviceState {
                media_content_id: Some("FV:1".into()),
                ..solo("media_player.living")
            },
        );
        let count = h.coordinator.apply_source(
            Some("media_player.living"),
            &SystemStatus::On,
            None,
            &topology,
        );
        assert_eq!(count, 0);
        assert_eq!(
            h.coordinator
                .apply_source(None, &SystemStatus::On, Some("Default"), &topology),
            0
        );
        assert_eq!(
            h.coordinator.apply_source(
                Some("media_player.living"),
                &SystemStatus::Off,
                Some("Default"),
                &topology
            ),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_source_selection_is_dropped() {
        let h = harness(Config::default());
        let topology = house();
        h.coordinator.selecting.store(true, Ordering::Release);
        assert_eq!(
            h.coordinator.apply_source(
                Some("media_player.living"),
                &SystemStatus::On,
                Some("Default"),
                &topology
            ),
            0
        );
        h.coordinator.selecting.store(false, Ordering::Release);
        assert_eq!(
            h.coordinator.apply_source(
                Some("media_player.living"),
                &SystemStatus::On,
                Some("Default"),
                &topology
            ),
            1
        );
        assert!(!h.coordinator.selecting.load(Ordering::Acquire));
    }
}
