//! Primary device election.

use serde::{Serialize, Serializer};

use super::snapshot::SignalSnapshot;
use super::status::SystemStatus;
use crate::topology::{Topology, TV_SOURCE};

/// Outcome of [`elect`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PrimaryResult {
    Resolved(String),
    /// The system is on but no speaker currently qualifies.
    #[default]
    NoneActive,
    /// The system is off; nothing leads.
    SystemOff,
}

impl PrimaryResult {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::NoneActive | Self::SystemOff => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl std::fmt::Display for PrimaryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(id) => f.write_str(id),
            Self::NoneActive => f.write_str("none"),
            Self::SystemOff => f.write_str("off"),
        }
    }
}

/// Serialized as the device id, `"none"`, or `""` when the system is off.
impl Serialize for PrimaryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Resolved(id) => serializer.serialize_str(id),
            Self::NoneActive => serializer.serialize_str("none"),
            Self::SystemOff => serializer.serialize_str(""),
        }
    }
}

/// Elects the device that should lead grouped playback.
///
/// With `OVERRIDE` the highest-precedence device playing its override content
/// wins. Otherwise the first speaker, walking active rooms in topology order
/// and each room's devices by priority, that is engaged, leads its own group,
/// and is not sitting on the TV input of a room whose TV is off.
pub fn elect(
    topology: &Topology,
    status: &SystemStatus,
    active_rooms: &[String],
    snapshot: &SignalSnapshot,
) -> PrimaryResult {
    match status {
        SystemStatus::Off | SystemStatus::Startup(_) => PrimaryResult::SystemOff,
        SystemStatus::Override => topology
            .devices_by_priority()
            .into_iter()
            .find(|d| snapshot.override_matches(d))
            .map(|d| PrimaryResult::Resolved(d.device_id.clone()))
            .unwrap_or(PrimaryResult::NoneActive),
        SystemStatus::On | SystemStatus::OnTv => {
            for room in topology
                .rooms()
                .iter()
                .filter(|r| active_rooms.contains(&r.name))
            {
                let tv_on = snapshot.room_tv_on(room);
                for device in room.devices_by_priority() {
                    if !device.is_speaker() {
                        continue;
                    }
                    let Some(state) = snapshot.device(&device.device_id) else {
                        continue;
                    };
                    if state.state.is_engaged()
                        && state.leads_group(&device.device_id)
                        && (tv_on || !state.source_is(TV_SOURCE))
                    {
                        return PrimaryResult::Resolved(device.device_id.clone());
                    }
                }
            }
            PrimaryResult::NoneActive
        }
    }
}

/// Highest-precedence speaker among the active devices.
///
/// Ties on priority go to the speaker configured first.
pub fn preferred_primary(topology: &Topology, active_devices: &[String]) -> Option<String> {
    topology
        .devices_by_priority()
        .into_iter()
        .find(|d| d.is_speaker() && active_devices.contains(&d.device_id))
        .map(|d| d.device_id.clone())
}
