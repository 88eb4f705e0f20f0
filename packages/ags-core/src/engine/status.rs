//! System status resolution.
//!
//! [`resolve`] is a pure function of topology, settings and one signal
//! snapshot. The only piece of history it needs is the schedule state seen by
//! the previous cycle, which the caller passes in.

use serde::{Serialize, Serializer};

use super::snapshot::SignalSnapshot;
use crate::state::Config;
use crate::topology::{Topology, TvMode};

/// System-wide operating status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemStatus {
    Off,
    On,
    OnTv,
    Override,
    /// Placeholder published before the first cycle: the default source name,
    /// or "Unknown" without one.
    Startup(String),
}

impl SystemStatus {
    /// Sentinel status for a topology that has not been evaluated yet.
    pub fn startup(topology: &Topology) -> Self {
        Self::Startup(
            topology
                .default_source()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::OnTv => "ON_TV",
            Self::Override => "OVERRIDE",
            Self::Startup(name) => name,
        }
    }

    /// Returns true for the statuses that group speakers for music or TV.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::On | Self::OnTv)
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SystemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of one status resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: SystemStatus,
    /// New value for the manual toggle, set on a schedule transition when
    /// schedule override is enabled.
    pub toggle_adjustment: Option<bool>,
    /// Schedule state seen by this cycle, `None` without a schedule.
    pub schedule_on: Option<bool>,
    /// Active rooms whose TV is on but configured not to elevate status.
    pub tv_suppressed_rooms: Vec<String>,
}

/// Computes the system status. First match wins:
///
/// 1. a device playing its override content → `OVERRIDE`
/// 2. zone check enabled and nobody home → `OFF`
/// 3. schedule off (without schedule override) → `OFF`
/// 4. manual toggle off → `OFF`
/// 5. a TV on in an active `tv_audio` room → `ON_TV`
/// 6. `ON`
pub fn resolve(
    topology: &Topology,
    config: &Config,
    snapshot: &SignalSnapshot,
    active_rooms: &[String],
    previous_schedule_on: Option<bool>,
) -> Resolution {
    let schedule_on = config.schedule.as_ref().map(|schedule| {
        snapshot
            .schedule_state
            .as_deref()
            .is_some_and(|s| s == schedule.on_state)
    });

    let toggle_adjustment = match (&config.schedule, previous_schedule_on, schedule_on) {
        (Some(schedule), Some(true), Some(false)) if schedule.schedule_override => Some(false),
        (Some(schedule), Some(false), Some(true)) if schedule.schedule_override => Some(true),
        _ => None,
    };
    let manual_toggle = toggle_adjustment.unwrap_or(snapshot.manual_toggle);

    let mut tv_suppressed_rooms = Vec::new();
    let mut tv_elevates = false;
    for room in topology
        .rooms()
        .iter()
        .filter(|r| active_rooms.contains(&r.name))
    {
        if !snapshot.room_tv_on(room) {
            continue;
        }
        match room.tv_mode() {
            TvMode::TvAudio => tv_elevates = true,
            TvMode::NoMusic => tv_suppressed_rooms.push(room.name.clone()),
        }
    }

    let status = if topology.devices().any(|d| snapshot.override_matches(d)) {
        SystemStatus::Override
    } else if !config.disable_zone && !snapshot.zone_present {
        SystemStatus::Off
    } else if schedule_on == Some(false)
        && !config
            .schedule
            .as_ref()
            .is_some_and(|s| s.schedule_override)
    {
        SystemStatus::Off
    } else if !manual_toggle {
        SystemStatus::Off
    } else if tv_elevates {
        SystemStatus::OnTv
    } else {
        SystemStatus::On
    };

    Resolution {
        status,
        toggle_adjustment,
        schedule_on,
        tv_suppressed_rooms,
    }
}
