//! Shared test doubles and topology builders.
//!
//! Used by the engine, queue, coordinator and orchestrator tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use super::traits::{DeviceCommandSink, SignalSource};
use super::types::{DeviceCommand, DeviceState, PlayerState};
use crate::error::{CommandError, CommandResult};
use crate::topology::{Device, DeviceType, Room, Source, Topology, TvMode, FAVORITE_CONTENT_TYPE};

// ─────────────────────────────────────────────────────────────────────────────
// Topology builders
// ─────────────────────────────────────────────────────────────────────────────

pub fn speaker(id: &str, priority: u32) -> Device {
    Device {
        device_id: id.to_string(),
        device_type: DeviceType::Speaker,
        priority,
        override_content: None,
        tv_mode: None,
        ott_devices: vec![],
    }
}

pub fn tv(id: &str, priority: u32) -> Device {
    Device {
        device_type: DeviceType::Tv,
        ..speaker(id, priority)
    }
}

pub fn tv_with_mode(id: &str, priority: u32, mode: TvMode) -> Device {
    Device {
        tv_mode: Some(mode),
        ..tv(id, priority)
    }
}

pub fn with_override(mut device: Device, content: &str) -> Device {
    device.override_content = Some(content.to_string());
    device
}

pub fn room(name: &str, devices: Vec<Device>) -> Room {
    Room {
        name: name.to_string(),
        devices,
    }
}

pub fn default_source() -> Source {
    Source {
        name: "Default".to_string(),
        value: "1".to_string(),
        media_content_type: FAVORITE_CONTENT_TYPE.to_string(),
        is_default: true,
    }
}

/// Topology with the given rooms and a single default favorite source.
pub fn topology(rooms: Vec<Room>) -> Topology {
    Topology::new(rooms, vec![default_source()]).expect("valid test topology")
}

/// Playing speaker that leads a group of the given members (itself first).
pub fn leading(id: &str, members: &[&str]) -> DeviceState {
    let mut group_members = vec![id.to_string()];
    group_members.extend(members.iter().map(|m| m.to_string()));
    DeviceState {
        state: PlayerState::Playing,
        group_members,
        source_list: vec!["TV".to_string()],
        ..Default::default()
    }
}

/// Playing speaker on its own.
pub fn solo(id: &str) -> DeviceState {
    leading(id, &[])
}

// ─────────────────────────────────────────────────────────────────────────────
// Signal source
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory signal source with mutable state.
pub struct FakeSignals {
    devices: RwLock<HashMap<String, DeviceState>>,
    zone: RwLock<bool>,
    schedules: RwLock<HashMap<String, String>>,
}

impl FakeSignals {
    /// Creates a source with zone presence on and no devices.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            zone: RwLock::new(true),
            schedules: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_device(&self, id: &str, state: DeviceState) {
        self.devices.write().insert(id.to_string(), state);
    }

    pub fn update_device(&self, id: &str, f: impl FnOnce(&mut DeviceState)) {
        let mut devices = self.devices.write();
        f(devices.entry(id.to_string()).or_default());
    }

    pub fn remove_device(&self, id: &str) {
        self.devices.write().remove(id);
    }

    pub fn set_zone(&self, present: bool) {
        *self.zone.write() = present;
    }

    pub fn set_schedule(&self, entity_id: &str, state: &str) {
        self.schedules
            .write()
            .insert(entity_id.to_string(), state.to_string());
    }

    /// Mirrors what a real device would report after a command.
    pub fn apply(&self, command: &DeviceCommand) {
        match command {
            DeviceCommand::Join { leader, members } => {
                let mut group = vec![leader.clone()];
                self.update_device(leader, |s| {
                    group.extend(
                        s.group_members
                            .iter()
                            .skip(1)
                            .filter(|m| !members.contains(m))
                            .cloned(),
                    );
                    group.extend(members.iter().cloned());
                    s.group_members = group.clone();
                });
                for member in members {
                    self.update_device(member, |s| s.group_members = group.clone());
                }
            }
            DeviceCommand::Unjoin { targets } => {
                for target in targets {
                    self.update_device(target, |s| s.group_members = vec![target.clone()]);
                }
                let mut devices = self.devices.write();
                for state in devices.values_mut() {
                    if state.group_members.len() > 1 {
                        state.group_members.retain(|m| !targets.contains(m));
                    }
                }
            }
            DeviceCommand::SelectSource { targets, source } => {
                for target in targets {
                    self.update_device(target, |s| s.source = Some(source.clone()));
                }
            }
            DeviceCommand::PlayMedia {
                target, content_id, ..
            } => {
                self.update_device(target, |s| {
                    s.state = PlayerState::Playing;
                    s.source = None;
                    s.media_content_id = Some(content_id.clone());
                });
            }
            DeviceCommand::Stop { targets } | DeviceCommand::MediaPause { targets } => {
                for target in targets {
                    self.update_device(target, |s| s.state = PlayerState::Paused);
                }
            }
            DeviceCommand::MediaPlay { targets } => {
                for target in targets {
                    self.update_device(target, |s| s.state = PlayerState::Playing);
                }
            }
            DeviceCommand::VolumeSet { targets, level } => {
                for target in targets {
                    self.update_device(target, |s| s.volume_level = Some(*level));
                }
            }
            DeviceCommand::MediaNextTrack { .. }
            | DeviceCommand::MediaPreviousTrack { .. }
            | DeviceCommand::ClearPlaylist { .. } => {}
        }
    }
}

impl SignalSource for FakeSignals {
    fn device_state(&self, device_id: &str) -> Option<DeviceState> {
        self.devices.read().get(device_id).cloned()
    }

    fn zone_presence(&self) -> bool {
        *self.zone.read()
    }

    fn schedule_state(&self, entity_id: &str) -> Option<String> {
        self.schedules.read().get(entity_id).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command sink
// ─────────────────────────────────────────────────────────────────────────────

/// Sink that records every command in call order.
///
/// Optionally mirrors commands into a [`FakeSignals`] and fails selected verbs.
pub struct RecordingSink {
    calls: Mutex<Vec<DeviceCommand>>,
    signals: Option<Arc<FakeSignals>>,
    failing_verbs: Vec<&'static str>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            signals: None,
            failing_verbs: Vec::new(),
        }
    }

    /// Records commands and applies them to `signals`.
    pub fn mirroring(signals: Arc<FakeSignals>) -> Self {
        Self {
            signals: Some(signals),
            ..Self::new()
        }
    }

    pub fn failing(verbs: &[&'static str]) -> Self {
        Self {
            failing_verbs: verbs.to_vec(),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<DeviceCommand> {
        self.calls.lock().clone()
    }

    pub fn verbs(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(DeviceCommand::verb).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl DeviceCommandSink for RecordingSink {
    async fn execute(&self, command: &DeviceCommand) -> CommandResult<()> {
        self.calls.lock().push(command.clone());
        if self.failing_verbs.contains(&command.verb()) {
            return Err(CommandError::Rejected(format!("{} refused", command.verb())));
        }
        if let Some(ref signals) = self.signals {
            signals.apply(command);
        }
        Ok(())
    }
}
