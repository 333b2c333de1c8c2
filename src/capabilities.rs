//! Capability flags and the device type catalogue.
//!
//! Capability flags reported by a device are the authoritative gate for
//! what gets expanded. Type codes are only a coarse hint.

use crate::models::zont::Device;
use std::collections::BTreeSet;

pub mod flags {
    pub const THERMOMETERS: &str = "has_thermometers";
    pub const THERMOSTAT: &str = "has_thermostat";
    pub const HEATING_CIRCUITS: &str = "has_heating_circuits";
    pub const RADIO_SENSORS: &str = "has_radiosensors";
    pub const WIRED_SENSORS: &str = "has_wired_sensors";
    pub const OPENTHERM: &str = "has_opentherm";
    pub const GUARD: &str = "has_guard_state";
    pub const SIREN: &str = "has_siren_control";
    pub const CAR_STATE: &str = "has_car_state";
    pub const GPS: &str = "has_gps";
    pub const VOLTAGE: &str = "has_voltage";
    pub const ENGINE_BLOCK: &str = "has_engine_block";
    pub const WEBASTO: &str = "has_webasto";
    pub const AUTO_IGNITION: &str = "has_autoignition";
    /// Selects the `{state, until}` encoding of auto-ignition.
    pub const AUTO_IGNITION_STATE: &str = "has_autoignition_state";
}

/// The capability flags of one device, re-read on every poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    pub fn of(device: &Device) -> Self {
        device.capabilities.iter().map(String::as_str).collect()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    pub fn without(&self, flag: &str) -> Self {
        let mut set = self.0.clone();
        set.remove(flag);
        CapabilitySet(set)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'a> FromIterator<&'a str> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        CapabilitySet(iter.into_iter().map(|s| s.trim().to_string()).collect())
    }
}

pub fn has_capability(device: &Device, flag: &str) -> bool {
    device.capabilities.iter().any(|c| c.trim() == flag)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Thermostat,
    Alarm,
    Tracker,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Thermostat => "thermostat",
            DeviceClass::Alarm => "alarm",
            DeviceClass::Tracker => "tracker",
            DeviceClass::Unknown => "unknown",
        }
    }

    /// Only a hint for whether z3k heating configuration is worth looking at.
    pub fn might_have_heating_zones(self) -> bool {
        matches!(self, DeviceClass::Thermostat | DeviceClass::Unknown)
    }
}

const THERMOSTAT_CODES: &[&str] = &[
    "T100", "T102", "H1", "H1V+", "H2", "H1000", "H1000+", "H2000+", "L1000", "SMART", "SMART2.0", "ZTA110",
    "CLIMATIC",
];
const ALARM_CODES: &[&str] = &["A100", "A300", "ZTC-100", "ZTC-110", "ZTC-111", "ZTC-120", "ZTC-200", "ZTC-700"];
const TRACKER_CODES: &[&str] = &["GTW-100", "ZTC-100M", "ZTC-700M", "ZTC-720", "ZTA-110"];

pub fn classify(type_code: &str) -> DeviceClass {
    let code = type_code.trim().to_ascii_uppercase();
    let code = code.as_str();
    if THERMOSTAT_CODES.contains(&code) {
        DeviceClass::Thermostat
    } else if TRACKER_CODES.contains(&code) {
        DeviceClass::Tracker
    } else if ALARM_CODES.contains(&code) {
        DeviceClass::Alarm
    } else {
        DeviceClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::zont::DeviceId;

    fn device_with(caps: &[&str]) -> Device {
        Device {
            id: DeviceId(1),
            device_type: None,
            name: None,
            capabilities: caps.iter().map(|s| s.to_string()).collect(),
            online: None,
            thermometers: None,
            thermostat_mode: None,
            thermostat_mode_temps: None,
            thermostat_ext_mode: None,
            thermostat_ext_modes_config: None,
            target_temp: None,
            zones: None,
            z3k_config: None,
            io: None,
        }
    }

    #[test]
    fn capability_lookup_is_exact() {
        let d = device_with(&[flags::GPS, flags::AUTO_IGNITION]);
        assert!(has_capability(&d, flags::GPS));
        assert!(!has_capability(&d, flags::AUTO_IGNITION_STATE));
        assert!(!has_capability(&device_with(&[]), flags::GPS));
    }

    #[test]
    fn capability_set_mirrors_device_flags() {
        let d = device_with(&[flags::GUARD, flags::SIREN, flags::GUARD]);
        let set = CapabilitySet::of(&d);
        assert_eq!(set.len(), 2);
        assert!(set.contains(flags::SIREN));
        assert!(!set.without(flags::SIREN).contains(flags::SIREN));
        assert!(set.without(flags::SIREN).contains(flags::GUARD));
    }

    #[test]
    fn classifies_type_codes() {
        assert_eq!(classify("h1v+"), DeviceClass::Thermostat);
        assert_eq!(classify("ZTC-720"), DeviceClass::Tracker);
        assert_eq!(classify("A300"), DeviceClass::Alarm);
        assert_eq!(classify("XYZ"), DeviceClass::Unknown);
        assert!(!DeviceClass::Tracker.might_have_heating_zones());
    }
}
