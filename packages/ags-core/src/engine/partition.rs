//! Active/inactive speaker partitioning.

use serde::Serialize;

use super::snapshot::SignalSnapshot;
use super::status::SystemStatus;
use crate::devices::PlayerState;
use crate::topology::Topology;

/// Speaker sets for one cycle, each in topology order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub active: Vec<String>,
    pub inactive: Vec<String>,
    /// Every speaker of an inactive room that has a TV, whatever its live state.
    pub inactive_tv_speakers: Vec<String>,
}

/// Splits speakers into active and inactive sets.
///
/// A speaker in an inactive room that already reports `on` is left out of
/// both sets, so a speaker someone just switched on by hand is not pulled
/// away from them.
pub fn partition(
    topology: &Topology,
    status: &SystemStatus,
    active_rooms: &[String],
    snapshot: &SignalSnapshot,
) -> Partition {
    let mut result = Partition::default();
    let off = *status == SystemStatus::Off;

    for room in topology.rooms() {
        let room_active = !off && active_rooms.contains(&room.name);
        for speaker in room.speakers() {
            let id = speaker.device_id.clone();
            if room_active {
                result.active.push(id);
                continue;
            }
            if room.has_tv() {
                result.inactive_tv_speakers.push(id.clone());
            }
            if off || snapshot.player_state(&id) != PlayerState::On {
                result.inactive.push(id);
            }
        }
    }

    result
}
