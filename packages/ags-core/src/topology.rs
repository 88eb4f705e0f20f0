//! Static room, device and source configuration.
//!
//! A [`Topology`] is built once from a [`TopologyConfig`] and is immutable
//! afterwards. Reconfiguration replaces the whole value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Source name that selects a speaker's TV (line-in / HDMI ARC) input.
pub const TV_SOURCE: &str = "TV";

/// Content type whose ids must carry the `FV:` favorite prefix.
pub const FAVORITE_CONTENT_TYPE: &str = "favorite_item_id";

/// Kind of playback device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Speaker,
    Tv,
    Streaming,
}

/// How a room treats a powered-on TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TvMode {
    /// TV audio is routed to the room's speakers and elevates status to `ON_TV`.
    #[default]
    TvAudio,
    /// TV presence is ignored for status; music keeps playing.
    NoMusic,
}

/// Streaming box wired into a TV input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OttDevice {
    pub device_id: String,
    pub tv_input: String,
    #[serde(default)]
    pub default: bool,
}

/// A configured playback device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_type: DeviceType,
    /// Lower value wins. Ties are broken by configuration order.
    pub priority: u32,
    /// Substring that, when found in the live media content id, forces `OVERRIDE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tv_mode: Option<TvMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ott_devices: Vec<OttDevice>,
}

impl Device {
    pub fn is_speaker(&self) -> bool {
        self.device_type == DeviceType::Speaker
    }

    pub fn is_tv(&self) -> bool {
        self.device_type == DeviceType::Tv
    }
}

/// A named room and its devices, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "room")]
    pub name: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Room {
    /// Returns true if any device in the room is a TV.
    pub fn has_tv(&self) -> bool {
        self.devices.iter().any(Device::is_tv)
    }

    /// TV handling for this room, taken from its first TV.
    pub fn tv_mode(&self) -> TvMode {
        self.devices
            .iter()
            .find(|d| d.is_tv())
            .and_then(|d| d.tv_mode)
            .unwrap_or_default()
    }

    /// Speakers of this room in configuration order.
    pub fn speakers(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_speaker())
    }

    /// Devices sorted by priority; equal priorities keep configuration order.
    pub fn devices_by_priority(&self) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.devices.iter().collect();
        devices.sort_by_key(|d| d.priority);
        devices
    }
}

/// A named music source the user can select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "source", alias = "Source")]
    pub name: String,
    /// Backend content id (favorite id, playlist uri, ...).
    #[serde(rename = "value", alias = "Source_Value")]
    pub value: String,
    pub media_content_type: String,
    #[serde(default, rename = "default", alias = "source_default")]
    pub is_default: bool,
}

impl Source {
    /// Content id as sent to the device, with the favorite prefix applied.
    pub fn media_content_id(&self) -> String {
        if self.media_content_type == FAVORITE_CONTENT_TYPE && !self.value.starts_with("FV:") {
            format!("FV:{}", self.value)
        } else {
            self.value.clone()
        }
    }
}

/// Unvalidated topology as read from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default, alias = "Sources")]
    pub sources: Vec<Source>,
}

impl TopologyConfig {
    /// Validates and freezes the configuration.
    pub fn build(self) -> ConfigResult<Topology> {
        Topology::new(self.rooms, self.sources)
    }
}

/// Validated, immutable room/device/source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    rooms: Vec<Room>,
    sources: Vec<Source>,
}

impl Topology {
    /// Builds a topology, rejecting structurally invalid input.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty or duplicate room names, empty or
    /// duplicate device ids (across all rooms, including linked streaming
    /// devices), and empty or duplicate source names.
    pub fn new(rooms: Vec<Room>, sources: Vec<Source>) -> ConfigResult<Self> {
        let mut room_names = HashSet::new();
        let mut device_ids = HashSet::new();

        for room in &rooms {
            if room.name.trim().is_empty() {
                return Err(ConfigError::EmptyRoomName);
            }
            if !room_names.insert(room.name.as_str()) {
                return Err(ConfigError::DuplicateRoom(room.name.clone()));
            }
            for device in &room.devices {
                if device.device_id.trim().is_empty() {
                    return Err(ConfigError::EmptyDeviceId {
                        room: room.name.clone(),
                    });
                }
                if !device_ids.insert(device.device_id.as_str()) {
                    return Err(ConfigError::DuplicateDevice(device.device_id.clone()));
                }
            }
        }

        // Streaming boxes may be shared between TVs but must not shadow a room device.
        for room in &rooms {
            for ott in room.devices.iter().flat_map(|d| d.ott_devices.iter()) {
                if device_ids.contains(ott.device_id.as_str()) {
                    return Err(ConfigError::DuplicateDevice(ott.device_id.clone()));
                }
            }
        }

        let mut source_names = HashSet::new();
        for source in &sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::EmptySourceName);
            }
            if !source_names.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
        }

        let default_count = sources.iter().filter(|s| s.is_default).count();
        if default_count > 1 {
            log::warn!(
                "[Topology] {} sources marked default, using '{}'",
                default_count,
                sources
                    .iter()
                    .find(|s| s.is_default)
                    .map(|s| s.name.as_str())
                    .unwrap_or_default()
            );
        }

        Ok(Self { rooms, sources })
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.name == name)
    }

    /// All devices across rooms, in configuration order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.rooms.iter().flat_map(|r| r.devices.iter())
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices().find(|d| d.device_id == device_id)
    }

    /// Room owning the given device.
    pub fn room_of(&self, device_id: &str) -> Option<&Room> {
        self.rooms
            .iter()
            .find(|r| r.devices.iter().any(|d| d.device_id == device_id))
    }

    /// Every speaker id in configuration order.
    pub fn speaker_ids(&self) -> Vec<String> {
        self.devices()
            .filter(|d| d.is_speaker())
            .map(|d| d.device_id.clone())
            .collect()
    }

    /// All devices sorted by priority; equal priorities keep configuration order.
    pub fn devices_by_priority(&self) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.devices().collect();
        devices.sort_by_key(|d| d.priority);
        devices
    }

    /// The first source marked default.
    pub fn default_source(&self) -> Option<&Source> {
        self.sources.iter().find(|s| s.is_default)
    }

    /// The default source, falling back to the first configured one.
    pub fn fallback_source(&self) -> Option<&Source> {
        self.default_source().or_else(|| self.sources.first())
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Returns true if the named source can be selected.
    ///
    /// "TV" is always selectable in addition to the catalog.
    pub fn is_selectable_source(&self, name: &str) -> bool {
        name == TV_SOURCE || self.source(name).is_some()
    }

    /// Returns true if the device's room contains a TV.
    pub fn in_tv_room(&self, device_id: &str) -> bool {
        self.room_of(device_id).is_some_and(Room::has_tv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(id: &str, priority: u32) -> Device {
        Device {
            device_id: id.to_string(),
            device_type: DeviceType::Speaker,
            priority,
            override_content: None,
            tv_mode: None,
            ott_devices: vec![],
        }
    }

    fn source(name: &str, default: bool) -> Source {
        Source {
            name: name.to_string(),
            value: "1".to_string(),
            media_content_type: FAVORITE_CONTENT_TYPE.to_string(),
            is_default: default,
        }
    }

    fn room(name: &str, devices: Vec<Device>) -> Room {
        Room {
            name: name.to_string(),
            devices,
        }
    }

    #[test]
    fn rejects_duplicate_rooms() {
        let result = Topology::new(vec![room("Living", vec![]), room("Living", vec![])], vec![]);
        assert_eq!(result, Err(ConfigError::DuplicateRoom("Living".into())));
    }

    #[test]
    fn rejects_device_in_two_rooms() {
        let result = Topology::new(
            vec![
                room("Living", vec![speaker("media_player.a", 1)]),
                room("Kitchen", vec![speaker("media_player.a", 2)]),
            ],
            vec![],
        );
        assert_eq!(
            result,
            Err(ConfigError::DuplicateDevice("media_player.a".into()))
        );
    }

    #[test]
    fn rejects_empty_ids_and_names() {
        assert_eq!(
            Topology::new(vec![room(" ", vec![])], vec![]),
            Err(ConfigError::EmptyRoomName)
        );
        assert_eq!(
            Topology::new(vec![room("Living", vec![speaker("", 1)])], vec![]),
            Err(ConfigError::EmptyDeviceId {
                room: "Living".into()
            })
        );
        assert_eq!(
            Topology::new(vec![], vec![source("", false)]),
            Err(ConfigError::EmptySourceName)
        );
    }

    #[test]
    fn first_default_source_wins() {
        let topology = Topology::new(
            vec![],
            vec![source("Jazz", false), source("Rock", true), source("Pop", true)],
        )
        .unwrap();
        assert_eq!(topology.default_source().unwrap().name, "Rock");
    }

    #[test]
    fn fallback_source_uses_first_when_no_default() {
        let topology = Topology::new(vec![], vec![source("Jazz", false)]).unwrap();
        assert!(topology.default_source().is_none());
        assert_eq!(topology.fallback_source().unwrap().name, "Jazz");
    }

    #[test]
    fn priority_ties_keep_configuration_order() {
        let r = room(
            "Living",
            vec![speaker("b", 2), speaker("a", 1), speaker("c", 1)],
        );
        let ids: Vec<_> = r
            .devices_by_priority()
            .iter()
            .map(|d| d.device_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn favorite_prefix_applied_once() {
        let mut s = source("Jazz", false);
        assert_eq!(s.media_content_id(), "FV:1");
        s.value = "FV:1".into();
        assert_eq!(s.media_content_id(), "FV:1");
        s.media_content_type = "playlist".into();
        s.value = "spotify:1".into();
        assert_eq!(s.media_content_id(), "spotify:1");
    }

    #[test]
    fn room_tv_mode_defaults_to_tv_audio() {
        let mut tv = speaker("media_player.tv", 2);
        tv.device_type = DeviceType::Tv;
        let r = room("Living", vec![speaker("s", 1), tv.clone()]);
        assert!(r.has_tv());
        assert_eq!(r.tv_mode(), TvMode::TvAudio);

        tv.tv_mode = Some(TvMode::NoMusic);
        let r = room("Living", vec![speaker("s", 1), tv]);
        assert_eq!(r.tv_mode(), TvMode::NoMusic);
    }

    #[test]
    fn deserializes_legacy_source_keys() {
        let json = r#"{
            "rooms": [],
            "Sources": [
                {"Source": "Jazz", "Source_Value": "2/8", "media_content_type": "favorite_item_id", "source_default": true}
            ]
        }"#;
        let config: TopologyConfig = serde_json::from_str(json).unwrap();
        let topology = config.build().unwrap();
        let jazz = topology.source("Jazz").unwrap();
        assert!(jazz.is_default);
        assert_eq!(jazz.media_content_id(), "FV:2/8");
    }
}
