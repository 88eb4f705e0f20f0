//! Pure decision logic.
//!
//! Each cycle runs snapshot → status → partition → primary. Nothing in this
//! module performs I/O or touches shared state; the orchestrator feeds it a
//! [`SignalSnapshot`] and applies the result.

mod partition;
mod primary;
mod snapshot;
mod status;

pub use partition::{partition, Partition};
pub use primary::{elect, preferred_primary, PrimaryResult};
pub use snapshot::SignalSnapshot;
pub use status::{resolve, Resolution, SystemStatus};

use crate::state::Config;
use crate::topology::{Topology, TvMode, TV_SOURCE};

/// Everything one cycle derives from a snapshot.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub resolution: Resolution,
    pub active_rooms: Vec<String>,
    pub partition: Partition,
    pub primary: PrimaryResult,
    pub preferred_primary: Option<String>,
    pub source_list: Vec<String>,
}

impl Evaluation {
    pub fn status(&self) -> &SystemStatus {
        &self.resolution.status
    }
}

/// Runs the full decision pipeline over one snapshot.
pub fn evaluate(
    topology: &Topology,
    config: &Config,
    snapshot: &SignalSnapshot,
    previous_schedule_on: Option<bool>,
) -> Evaluation {
    let active_rooms = snapshot.active_rooms(topology);
    let resolution = resolve(topology, config, snapshot, &active_rooms, previous_schedule_on);
    let partition = partition(topology, &resolution.status, &active_rooms, snapshot);
    let primary = elect(topology, &resolution.status, &active_rooms, snapshot);
    let preferred_primary = preferred_primary(topology, &partition.active);
    let source_list = source_list(
        topology,
        config,
        snapshot,
        &active_rooms,
        &resolution.tv_suppressed_rooms,
    );

    Evaluation {
        resolution,
        active_rooms,
        partition,
        primary,
        preferred_primary,
        source_list,
    }
}

/// Selectable source names: the catalog, plus "TV" while an active room's TV
/// is on. A suppressed (`no_music`) TV anywhere active hides "TV" again.
pub fn source_list(
    topology: &Topology,
    config: &Config,
    snapshot: &SignalSnapshot,
    active_rooms: &[String],
    tv_suppressed_rooms: &[String],
) -> Vec<String> {
    let mut names: Vec<String> = topology.sources().iter().map(|s| s.name.clone()).collect();
    let tv_available = !config.disable_tv_source
        && tv_suppressed_rooms.is_empty()
        && topology.rooms().iter().any(|room| {
            active_rooms.contains(&room.name)
                && room.tv_mode() == TvMode::TvAudio
                && snapshot.room_tv_on(room)
        });
    if tv_available && !names.iter().any(|n| n == TV_SOURCE) {
        names.push(TV_SOURCE.to_string());
    }
    names
}
