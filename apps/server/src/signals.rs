//! File-backed signal source.
//!
//! Live device state is read from a YAML file that an external bridge (or a
//! person with an editor) keeps up to date:
//!
//! ```yaml
//! zone: true
//! schedules:
//!   schedule.audio: "on"
//! active_rooms: [Living]
//! devices:
//!   media_player.living:
//!     state: playing
//!     group_members: [media_player.living]
//!     source_list: [TV]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ags_core::{DeviceState, SignalSource};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;

/// Contents of the state file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StateFile {
    pub zone: bool,
    pub schedules: HashMap<String, String>,
    pub devices: HashMap<String, DeviceState>,
    /// Room switches to apply; `None` leaves them alone.
    pub active_rooms: Option<Vec<String>>,
    /// Manual system toggle to apply; `None` leaves it alone.
    pub manual_toggle: Option<bool>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            zone: true,
            schedules: HashMap::new(),
            devices: HashMap::new(),
            active_rooms: None,
            manual_toggle: None,
        }
    }
}

/// [`SignalSource`] over a YAML state file.
pub struct FileSignalSource {
    path: Option<PathBuf>,
    state: RwLock<StateFile>,
}

impl FileSignalSource {
    /// Opens and reads the state file.
    ///
    /// Without a path, the source reports an empty house with someone home.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let source = Self {
            path: path.map(Path::to_path_buf),
            state: RwLock::new(StateFile::default()),
        };
        source.reload()?;
        Ok(source)
    }

    /// Re-reads the file. Returns true if its contents changed.
    pub fn reload(&self) -> Result<bool> {
        let Some(ref path) = self.path else {
            return Ok(false);
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let next: StateFile = if content.trim().is_empty() {
            StateFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?
        };

        let mut state = self.state.write();
        if *state == next {
            return Ok(false);
        }
        *state = next;
        Ok(true)
    }

    /// Current contents of the state file.
    pub fn snapshot(&self) -> StateFile {
        self.state.read().clone()
    }
}

impl SignalSource for FileSignalSource {
    fn device_state(&self, device_id: &str) -> Option<DeviceState> {
        self.state.read().devices.get(device_id).cloned()
    }

    fn zone_presence(&self) -> bool {
        self.state.read().zone
    }

    fn schedule_state(&self, entity_id: &str) -> Option<String> {
        self.state.read().schedules.get(entity_id).cloned()
    }
}
