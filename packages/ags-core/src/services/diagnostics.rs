//! Diagnostics report.
//!
//! A point-in-time dump of the derived state next to every configured device's
//! live signal, for troubleshooting why the system picked what it picked.

use serde::Serialize;

use crate::devices::{DeviceState, SignalSource};
use crate::engine::SignalSnapshot;
use crate::state::{Config, PublishedState};
use crate::topology::{DeviceType, Topology};
use crate::utils::now_millis;

/// Live view of one configured device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDiagnostics {
    pub device_id: String,
    pub room: String,
    pub device_type: DeviceType,
    pub priority: u32,
    /// Raw reported state; `None` when the device is unknown.
    pub state: Option<DeviceState>,
    pub override_match: bool,
    /// Linked streaming devices that are currently powered.
    pub powered_ott_devices: Vec<String>,
}

/// Full troubleshooting report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    /// Unix timestamp in milliseconds.
    pub generated_at: u64,
    pub published: PublishedState,
    pub config: Config,
    pub zone_present: bool,
    pub schedule_state: Option<String>,
    pub queue_pending: usize,
    pub devices: Vec<DeviceDiagnostics>,
}

impl DiagnosticsReport {
    /// Reads every device once and assembles the report.
    pub fn collect(
        topology: &Topology,
        config: &Config,
        signals: &dyn SignalSource,
        published: &PublishedState,
        queue_pending: usize,
    ) -> Self {
        let snapshot = SignalSnapshot::capture(
            topology,
            signals,
            config,
            published.manual_toggle,
            &Default::default(),
        );

        let devices = topology
            .rooms()
            .iter()
            .flat_map(|room| room.devices.iter().map(move |d| (room, d)))
            .map(|(room, device)| DeviceDiagnostics {
                device_id: device.device_id.clone(),
                room: room.name.clone(),
                device_type: device.device_type,
                priority: device.priority,
                state: signals.device_state(&device.device_id),
                override_match: snapshot.override_matches(device),
                powered_ott_devices: device
                    .ott_devices
                    .iter()
                    .filter(|o| snapshot.is_powered(&o.device_id))
                    .map(|o| o.device_id.clone())
                    .collect(),
            })
            .collect();

        Self {
            generated_at: now_millis(),
            published: published.clone(),
            config: config.clone(),
            zone_present: snapshot.zone_present,
            schedule_state: snapshot.schedule_state,
            queue_pending,
            devices,
        }
    }

    /// Serializes the report to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
