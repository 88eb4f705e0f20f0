//! Per-cycle view of the outside world.
//!
//! A [`SignalSnapshot`] is read once at the start of a cycle so that every
//! stage of the cycle sees the same device states.

use std::collections::{HashMap, HashSet};

use crate::devices::{DeviceState, PlayerState, SignalSource};
use crate::state::Config;
use crate::topology::{Device, Room, Topology, TvMode};

/// Immutable signal view for one resolution cycle.
#[derive(Debug, Clone, Default)]
pub struct SignalSnapshot {
    pub zone_present: bool,
    /// Raw state of the configured schedule entity.
    pub schedule_state: Option<String>,
    pub manual_toggle: bool,
    /// Rooms whose activation switch is on.
    pub room_switches: HashSet<String>,
    /// Reachable devices only; unavailable ones are dropped on capture.
    devices: HashMap<String, DeviceState>,
}

impl SignalSnapshot {
    /// Reads every configured device (and linked streaming device) once.
    pub fn capture(
        topology: &Topology,
        signals: &dyn SignalSource,
        config: &Config,
        manual_toggle: bool,
        room_switches: &HashSet<String>,
    ) -> Self {
        let mut devices = HashMap::new();
        let ids = topology.devices().flat_map(|d| {
            std::iter::once(d.device_id.as_str())
                .chain(d.ott_devices.iter().map(|o| o.device_id.as_str()))
        });
        for id in ids {
            match signals.device_state(id) {
                Some(state) if state.state != PlayerState::Unavailable => {
                    devices.insert(id.to_string(), state);
                }
                Some(_) => log::debug!("[Snapshot] {} unavailable, treating as off", id),
                None => log::trace!("[Snapshot] {} has no state", id),
            }
        }

        Self {
            zone_present: signals.zone_presence(),
            schedule_state: config
                .schedule
                .as_ref()
                .and_then(|s| signals.schedule_state(&s.entity_id)),
            manual_toggle,
            room_switches: room_switches.clone(),
            devices,
        }
    }

    /// Live state of a device, `None` if absent or unavailable.
    pub fn device(&self, device_id: &str) -> Option<&DeviceState> {
        self.devices.get(device_id)
    }

    /// Player state, with missing devices reported as off.
    pub fn player_state(&self, device_id: &str) -> PlayerState {
        self.device(device_id).map(|d| d.state).unwrap_or_default()
    }

    pub fn is_powered(&self, device_id: &str) -> bool {
        self.player_state(device_id).is_powered()
    }

    /// Returns true if a TV is powered, directly or through a linked streaming device.
    pub fn tv_is_on(&self, device: &Device) -> bool {
        self.is_powered(&device.device_id)
            || device
                .ott_devices
                .iter()
                .any(|o| self.is_powered(&o.device_id))
    }

    /// Returns true if any TV in the room is on.
    pub fn room_tv_on(&self, room: &Room) -> bool {
        room.devices
            .iter()
            .filter(|d| d.is_tv())
            .any(|d| self.tv_is_on(d))
    }

    /// Returns true if the device is playing its configured override content.
    pub fn override_matches(&self, device: &Device) -> bool {
        device.override_content.as_deref().is_some_and(|needle| {
            !needle.is_empty()
                && self
                    .device(&device.device_id)
                    .is_some_and(|s| s.media_contains(needle))
        })
    }

    /// Rooms that are switched on, or whose TV is on in `tv_audio` mode.
    ///
    /// Returned in topology order.
    pub fn active_rooms(&self, topology: &Topology) -> Vec<String> {
        topology
            .rooms()
            .iter()
            .filter(|room| {
                self.room_switches.contains(&room.name)
                    || (room.tv_mode() == TvMode::TvAudio && self.room_tv_on(room))
            })
            .map(|room| room.name.clone())
            .collect()
    }
}
