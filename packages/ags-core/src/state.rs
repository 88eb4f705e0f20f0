//! Configuration and published state types.
//!
//! [`Config`] holds the tunable behaviour of the engine. [`PublishedState`] is
//! the read-only snapshot handed to UI and sensor consumers after each cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{Evaluation, PrimaryResult, SystemStatus};
use crate::error::{ConfigError, ConfigResult};
use crate::topology::Topology;

/// A schedule entity that gates the system.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub entity_id: String,

    /// State string meaning "on".
    #[serde(default = "default_on_state")]
    pub on_state: String,

    /// State string meaning "off". Anything other than `on_state` counts as off;
    /// this is kept for diagnostics.
    #[serde(default = "default_off_state")]
    pub off_state: String,

    /// When true, the schedule only flips the manual toggle on its own
    /// transitions instead of forcing `OFF` while it is off.
    #[serde(default)]
    pub schedule_override: bool,
}

fn default_on_state() -> String {
    "on".to_string()
}

fn default_off_state() -> String {
    "off".to_string()
}

/// Engine configuration.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Ignore zone presence.
    pub disable_zone: bool,

    /// Initial value of the manual system toggle.
    pub default_on: bool,

    /// Never select the TV input when shutting down or parking speakers.
    pub disable_tv_source: bool,

    /// Interval of the periodic safety-net recompute (seconds, 0 disables).
    pub interval_sync_secs: u64,

    /// Delay before re-checking when no primary could be elected (seconds).
    pub primary_delay_secs: u64,

    /// Poll interval of wait-until actions (milliseconds).
    pub poll_interval_ms: u64,

    /// Cap on waiting for speakers to ungroup (seconds).
    pub ungroup_timeout_secs: u64,

    /// Cap on waiting for speakers to group (seconds).
    pub group_timeout_secs: u64,

    /// Pause after each join/unjoin step (milliseconds).
    pub command_spacing_ms: u64,

    /// Optional schedule gate.
    pub schedule: Option<ScheduleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disable_zone: false,
            default_on: false,
            disable_tv_source: false,
            interval_sync_secs: 30,
            primary_delay_secs: 5,
            poll_interval_ms: 100,
            ungroup_timeout_secs: 5,
            group_timeout_secs: 5,
            command_spacing_ms: 500,
            schedule: None,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] for values that would make
    /// waits spin or never bound.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "poll_interval_ms must be >= 1".to_string(),
            ));
        }
        if self.ungroup_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "ungroup_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.group_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "group_timeout_secs must be >= 1".to_string(),
            ));
        }
        if let Some(ref schedule) = self.schedule {
            if schedule.entity_id.trim().is_empty() {
                return Err(ConfigError::InvalidSetting(
                    "schedule.entity_id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ungroup_timeout(&self) -> Duration {
        Duration::from_secs(self.ungroup_timeout_secs)
    }

    pub fn group_timeout(&self) -> Duration {
        Duration::from_secs(self.group_timeout_secs)
    }

    pub fn command_spacing(&self) -> Duration {
        Duration::from_millis(self.command_spacing_ms)
    }

    pub fn primary_delay(&self) -> Duration {
        Duration::from_secs(self.primary_delay_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Published State
// ─────────────────────────────────────────────────────────────────────────────

/// Derived state published once per cycle.
///
/// Readers get an `Arc` of the last published value and never block a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedState {
    pub status: SystemStatus,
    pub primary: PrimaryResult,
    pub preferred_primary: Option<String>,
    pub active_rooms: Vec<String>,
    pub active_devices: Vec<String>,
    pub inactive_devices: Vec<String>,
    pub inactive_tv_speakers: Vec<String>,
    pub current_source: Option<String>,
    pub source_list: Vec<String>,
    pub manual_toggle: bool,
    pub schedule_on: Option<bool>,
    /// Number of completed cycles.
    pub cycle: u64,
    /// Unix timestamp in milliseconds.
    pub updated_at: u64,
}

impl PublishedState {
    /// State shown before the first cycle has run.
    pub fn initial(topology: &Topology, manual_toggle: bool) -> Self {
        Self {
            status: SystemStatus::startup(topology),
            primary: PrimaryResult::NoneActive,
            preferred_primary: None,
            active_rooms: Vec::new(),
            active_devices: Vec::new(),
            inactive_devices: Vec::new(),
            inactive_tv_speakers: Vec::new(),
            current_source: topology.fallback_source().map(|s| s.name.clone()),
            source_list: topology.sources().iter().map(|s| s.name.clone()).collect(),
            manual_toggle,
            schedule_on: None,
            cycle: 0,
            updated_at: 0,
        }
    }

    /// Builds the published view of a finished cycle.
    pub fn from_evaluation(
        evaluation: Evaluation,
        current_source: Option<String>,
        manual_toggle: bool,
        cycle: u64,
        updated_at: u64,
    ) -> Self {
        let Evaluation {
            resolution,
            active_rooms,
            partition,
            primary,
            preferred_primary,
            source_list,
        } = evaluation;
        Self {
            status: resolution.status,
            primary,
            preferred_primary,
            active_rooms,
            active_devices: partition.active,
            inactive_devices: partition.inactive,
            inactive_tv_speakers: partition.inactive_tv_speakers,
            current_source,
            source_list,
            manual_toggle,
            schedule_on: resolution.schedule_on,
            cycle,
            updated_at,
        }
    }

    /// Serializes the state to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
