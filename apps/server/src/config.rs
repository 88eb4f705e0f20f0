//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use ags_core::{Config, Room, Source, Topology, TopologyConfig};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Rooms and their devices, in priority-tiebreak order.
    pub rooms: Vec<Room>,

    /// Selectable music sources.
    #[serde(alias = "Sources")]
    pub sources: Vec<Source>,

    /// Engine settings.
    /// Overrides: `AGS_INTERVAL_SYNC`, `AGS_DEFAULT_ON`
    pub settings: Config,

    /// YAML file holding live device state.
    /// Override: `AGS_STATE_FILE`
    pub state_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AGS_INTERVAL_SYNC") {
            if let Ok(secs) = val.parse() {
                self.settings.interval_sync_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("AGS_DEFAULT_ON") {
            if let Ok(on) = val.parse() {
                self.settings.default_on = on;
            }
        }

        // Note: AGS_STATE_FILE is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Validates rooms and sources into a [`Topology`].
    pub fn topology(&self) -> Result<Topology> {
        TopologyConfig {
            rooms: self.rooms.clone(),
            sources: self.sources.clone(),
        }
        .build()
        .context("Invalid room/source configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
rooms:
  - room: Living
    devices:
      - device_id: media_player.living
        device_type: speaker
        priority: 1
      - device_id: media_player.tv
        device_type: tv
        priority: 2
        tv_mode: no_music
Sources:
  - Source: Jazz
    Source_Value: "2/8"
    media_content_type: favorite_item_id
    source_default: true
settings:
  default_on: true
  schedule:
    entity_id: schedule.audio
state_file: /tmp/ags-state.yaml
"#;

    #[test]
    fn parses_rooms_sources_and_settings() {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.rooms.len(), 1);
        assert!(config.settings.default_on);
        assert_eq!(config.settings.interval_sync_secs, 30);
        let schedule = config.settings.schedule.as_ref().unwrap();
        assert_eq!(schedule.on_state, "on");
        assert_eq!(
            config.state_file.as_deref(),
            Some(Path::new("/tmp/ags-state.yaml"))
        );

        let topology = config.topology().unwrap();
        assert_eq!(topology.default_source().unwrap().name, "Jazz");
        assert!(topology.in_tv_room("media_player.living"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }

    #[test]
    fn duplicate_rooms_fail_topology_build() {
        let config = ServerConfig::parse(
            "rooms:\n  - room: Living\n  - room: Living\n",
        )
        .unwrap();
        assert!(config.topology().is_err());
    }
}
