//! Models for the ZONT cloud device-list payload.
//!
//! Notes
//! - The payload is heterogeneous: which blocks are present depends on the
//!   capabilities a device reports, so nearly every field is optional.
//! - Unknown fields are ignored; a missing or `null` field never fails decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An explicit `null` decodes like an absent field.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

/// Identifier of a z3k object (heating circuit, mode, sensor, boiler adapter).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// z3k-state keys arrive as JSON object keys, i.e. strings.
    pub fn parse(key: &str) -> Option<Self> {
        key.trim().parse::<i64>().ok().map(ObjectId)
    }
}

// =====================
// Device list
// =====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceType {
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub online: Option<bool>,

    #[serde(default)]
    pub thermometers: Option<Vec<Thermometer>>,

    /// Legacy thermostat: current mode key and per-mode target temperatures.
    #[serde(default)]
    pub thermostat_mode: Option<String>,
    #[serde(default)]
    pub thermostat_mode_temps: Option<BTreeMap<String, Option<f64>>>,

    /// Extended (zoned) thermostat.
    #[serde(default)]
    pub thermostat_ext_mode: Option<Value>,
    #[serde(default)]
    pub thermostat_ext_modes_config: Option<BTreeMap<String, ExtModeConfig>>,

    #[serde(default)]
    pub target_temp: Option<f64>,
    #[serde(default)]
    pub zones: Option<Vec<ThermostatZone>>,

    #[serde(default)]
    pub z3k_config: Option<Z3kConfig>,
    #[serde(default)]
    pub io: Option<Io>,
}

impl Device {
    pub fn type_code(&self) -> &str {
        self.device_type
            .as_ref()
            .and_then(|t| t.code.as_deref())
            .unwrap_or("unknown")
    }

    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => format!("{} {}", self.type_code(), self.id.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thermometer {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_value: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_assigned_to_slot: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtModeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    /// Zone id -> configured temperature; `null` means the zone is not used in this mode.
    #[serde(default, deserialize_with = "null_as_default")]
    pub zone_temp: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThermostatZone {
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_temp: Option<f64>,
}

impl ThermostatZone {
    /// Zone ids are numbers on some firmwares and strings on others.
    pub fn key(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// =====================
// z3k configuration
// =====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Z3kConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub heating_circuits: Vec<Z3kObject>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub heating_modes: Vec<Z3kHeatingMode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub radiosensors: Vec<Z3kObject>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wired_temperature_sensors: Vec<Z3kObject>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub boiler_adapters: Vec<Z3kObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z3kObject {
    pub id: ObjectId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z3kHeatingMode {
    pub id: ObjectId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub zones: Vec<Z3kModeZone>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Z3kModeZone {
    #[serde(default)]
    pub circuit: Option<ObjectId>,
    #[serde(default)]
    pub adjusting_sensor: Option<ObjectId>,
}

// =====================
// Live IO block
// =====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Io {
    #[serde(rename = "z3k-state", default)]
    pub z3k_state: Option<BTreeMap<String, Z3kObjectState>>,
    #[serde(rename = "guard-state", default)]
    pub guard_state: Option<String>,
    #[serde(default)]
    pub siren: Option<bool>,
    #[serde(rename = "engine-block", default)]
    pub engine_block: Option<bool>,
    #[serde(default)]
    pub webasto: Option<bool>,
    /// Plain boolean or `{state, until}` depending on firmware.
    #[serde(rename = "auto-ignition", default)]
    pub auto_ignition: Option<Value>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(rename = "last-gps", default)]
    pub last_gps: Option<GpsFix>,
    #[serde(rename = "car-state", default)]
    pub car_state: Option<BTreeMap<String, Option<bool>>>,
}

/// Live state of one z3k object. Circuits, sensors and boiler adapters share
/// the same map, so this is the union of their fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Z3kObjectState {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub target_temp: Option<f64>,
    #[serde(default)]
    pub curr_temp: Option<f64>,
    #[serde(default)]
    pub sensor_ok: Option<bool>,
    /// Raw battery voltage.
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub rssi: Option<f64>,
    #[serde(default)]
    pub ot: Option<OtState>,
}

/// OpenTherm telemetry as reported by a boiler adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtState {
    /// Target water temperature.
    #[serde(default)]
    pub dt: Option<f64>,
    /// Actual water temperature.
    #[serde(default)]
    pub bt: Option<f64>,
    #[serde(default)]
    pub dhw_t: Option<f64>,
    /// Relative modulation level.
    #[serde(default)]
    pub rml: Option<f64>,
    /// Return water temperature.
    #[serde(default)]
    pub rt: Option<f64>,
    /// Outdoor temperature.
    #[serde(default)]
    pub ot: Option<f64>,
    /// Water pressure.
    #[serde(default)]
    pub wp: Option<f64>,
    /// DHW flow rate.
    #[serde(default)]
    pub fr: Option<f64>,
    /// Status flags; `fl` means the flame is on.
    #[serde(default)]
    pub s: Option<Vec<String>>,
    #[serde(default)]
    pub ff: Option<OtFault>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtFault {
    #[serde(default)]
    pub c: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpsFix {
    /// Longitude.
    #[serde(default)]
    pub x: Option<f64>,
    /// Latitude.
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
}
