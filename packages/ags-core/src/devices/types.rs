//! Domain types for live device state and device commands.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Power / transport state reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    Off,
    On,
    Idle,
    Paused,
    Standby,
    Playing,
    Buffering,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl PlayerState {
    /// Parses a state string; unrecognised values become [`PlayerState::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "off" => Self::Off,
            "on" => Self::On,
            "idle" => Self::Idle,
            "paused" => Self::Paused,
            "standby" => Self::Standby,
            "playing" => Self::Playing,
            "buffering" => Self::Buffering,
            "unavailable" => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// Returns true unless the device is off or cannot be reached.
    pub fn is_powered(self) -> bool {
        !matches!(self, Self::Off | Self::Unavailable)
    }

    /// Returns true if the device is doing something (eligible to lead a group).
    pub fn is_engaged(self) -> bool {
        !matches!(
            self,
            Self::Off | Self::Idle | Self::Paused | Self::Standby | Self::Unavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Idle => "idle",
            Self::Paused => "paused",
            Self::Standby => "standby",
            Self::Playing => "playing",
            Self::Buffering => "buffering",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of a single device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub state: PlayerState,
    /// Group members, leader first. A solo speaker lists only itself.
    #[serde(default)]
    pub group_members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub source_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_content_id: Option<String>,
    /// Volume in `0.0..=1.0`, when the device reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_level: Option<f32>,
}

impl DeviceState {
    pub fn new(state: PlayerState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Returns true if this device leads its group (or plays solo).
    pub fn leads_group(&self, own_id: &str) -> bool {
        self.group_members.first().is_some_and(|m| m == own_id)
    }

    /// Returns true if the device is not grouped with anything else.
    pub fn is_ungrouped(&self) -> bool {
        self.group_members.len() <= 1
    }

    pub fn source_is(&self, name: &str) -> bool {
        self.source.as_deref() == Some(name)
    }

    /// Returns true if the live media content id contains `needle`.
    pub fn media_contains(&self, needle: &str) -> bool {
        self.media_content_id
            .as_deref()
            .is_some_and(|id| id.contains(needle))
    }
}

/// Transport control forwarded to the primary speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Play,
    Pause,
    Stop,
    NextTrack,
    PreviousTrack,
}

impl Transport {
    /// Command addressing `target`.
    pub fn command(self, target: &str) -> DeviceCommand {
        let targets = vec![target.to_string()];
        match self {
            Self::Play => DeviceCommand::MediaPlay { targets },
            Self::Pause => DeviceCommand::MediaPause { targets },
            Self::Stop => DeviceCommand::Stop { targets },
            Self::NextTrack => DeviceCommand::MediaNextTrack { targets },
            Self::PreviousTrack => DeviceCommand::MediaPreviousTrack { targets },
        }
    }
}

/// A device-control command sent through the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    /// Groups `members` under `leader`.
    Join {
        leader: String,
        members: Vec<String>,
    },
    /// Removes each target from its group.
    Unjoin { targets: Vec<String> },
    SelectSource {
        targets: Vec<String>,
        source: String,
    },
    PlayMedia {
        target: String,
        content_id: String,
        content_type: String,
    },
    Stop { targets: Vec<String> },
    MediaPlay { targets: Vec<String> },
    MediaPause { targets: Vec<String> },
    MediaNextTrack { targets: Vec<String> },
    MediaPreviousTrack { targets: Vec<String> },
    /// Not emitted by any sequence; accepted so hosts can share one sink
    /// vocabulary with other controllers.
    ClearPlaylist { targets: Vec<String> },
    VolumeSet {
        targets: Vec<String>,
        level: f32,
    },
}

impl DeviceCommand {
    /// Command verb as a service name.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Unjoin { .. } => "unjoin",
            Self::SelectSource { .. } => "select_source",
            Self::PlayMedia { .. } => "play_media",
            Self::Stop { .. } => "stop",
            Self::MediaPlay { .. } => "media_play",
            Self::MediaPause { .. } => "media_pause",
            Self::MediaNextTrack { .. } => "media_next_track",
            Self::MediaPreviousTrack { .. } => "media_previous_track",
            Self::ClearPlaylist { .. } => "clear_playlist",
            Self::VolumeSet { .. } => "volume_set",
        }
    }

    /// Devices addressed by the command.
    pub fn targets(&self) -> Vec<String> {
        match self {
            Self::Join { leader, .. } => vec![leader.clone()],
            Self::PlayMedia { target, .. } => vec![target.clone()],
            Self::Unjoin { targets }
            | Self::SelectSource { targets, .. }
            | Self::Stop { targets }
            | Self::MediaPlay { targets }
            | Self::MediaPause { targets }
            | Self::MediaNextTrack { targets }
            | Self::MediaPreviousTrack { targets }
            | Self::ClearPlaylist { targets }
            | Self::VolumeSet { targets, .. } => targets.clone(),
        }
    }

    /// Parameters beyond the target list.
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Self::Join { members, .. } => {
                params.insert("group_members".into(), json!(members));
            }
            Self::SelectSource { source, .. } => {
                params.insert("source".into(), json!(source));
            }
            Self::PlayMedia {
                content_id,
                content_type,
                ..
            } => {
                params.insert("media_content_id".into(), json!(content_id));
                params.insert("media_content_type".into(), json!(content_type));
            }
            Self::VolumeSet { level, .. } => {
                params.insert("volume_level".into(), json!(level));
            }
            Self::Unjoin { .. }
            | Self::Stop { .. }
            | Self::MediaPlay { .. }
            | Self::MediaPause { .. }
            | Self::MediaNextTrack { .. }
            | Self::MediaPreviousTrack { .. }
            | Self::ClearPlaylist { .. } => {}
        }
        params
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.verb(), self.targets().join(", "))?;
        let params = self.params();
        if !params.is_empty() {
            write!(f, " {}", Value::Object(params))?;
        }
        Ok(())
    }
}
