//! Heating circuits and modes of one device, and which mode toggles which circuit.
//!
//! A topology is rebuilt from the device configuration every poll cycle and
//! belongs to that device only.

use crate::capabilities::{classify, flags, has_capability};
use crate::models::zont::{Device, ObjectId};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatingCircuit {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatingMode {
    pub id: ObjectId,
    pub name: String,
    /// Circuit whose adjusting sensor this mode switches on.
    pub circuit_on: Option<ObjectId>,
    /// Circuit this mode switches off.
    pub circuit_off: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatingTopology {
    circuits: BTreeMap<ObjectId, HeatingCircuit>,
    /// Kept in configuration order; resolution depends on it.
    modes: Vec<HeatingMode>,
}

impl HeatingTopology {
    pub fn build(device: &Device) -> Self {
        let Some(cfg) = device.z3k_config.as_ref() else {
            return Self::default();
        };
        if !has_capability(device, flags::HEATING_CIRCUITS) && !classify(device.type_code()).might_have_heating_zones() {
            return Self::default();
        }

        let circuits = cfg
            .heating_circuits
            .iter()
            .map(|c| {
                let name = c.name.clone().unwrap_or_else(|| format!("Circuit {}", c.id.0));
                (c.id, HeatingCircuit { id: c.id, name })
            })
            .collect::<BTreeMap<_, _>>();

        let mut modes = Vec::with_capacity(cfg.heating_modes.len());
        for m in &cfg.heating_modes {
            let mut mode = HeatingMode {
                id: m.id,
                name: m.name.clone().unwrap_or_else(|| format!("Mode {}", m.id.0)),
                circuit_on: None,
                circuit_off: None,
            };
            for zone in &m.zones {
                let Some(circuit) = zone.circuit.filter(|c| circuits.contains_key(c)) else {
                    continue;
                };
                if zone.adjusting_sensor.is_some() {
                    mode.circuit_on = Some(circuit);
                } else {
                    mode.circuit_off = Some(circuit);
                }
            }
            modes.push(mode);
        }

        debug!(
            "Topology: device {} has {} circuit(s), {} mode(s)",
            device.id.0,
            circuits.len(),
            modes.len()
        );
        HeatingTopology { circuits, modes }
    }

    pub fn circuit(&self, id: ObjectId) -> Option<&HeatingCircuit> {
        self.circuits.get(&id)
    }

    pub fn modes(&self) -> &[HeatingMode] {
        &self.modes
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty() && self.modes.is_empty()
    }

    /// Mode to select so that `circuit` ends up on (`desired_on`) or off.
    ///
    /// When several modes claim the same role the last one in configuration
    /// order wins. Without any match the circuit id itself is returned.
    pub fn resolve_mode_for_circuit(&self, circuit: ObjectId, desired_on: bool) -> ObjectId {
        let mut resolved = None;
        for mode in &self.modes {
            let claim = if desired_on { mode.circuit_on } else { mode.circuit_off };
            if claim == Some(circuit) {
                resolved = Some(mode.id);
            }
        }
        resolved.unwrap_or(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(value: serde_json::Value) -> Device {
        serde_json::from_value(value).expect("valid device")
    }

    fn living_room() -> Device {
        device(json!({
            "id": 100,
            "device_type": {"code": "H2000+"},
            "capabilities": ["has_heating_circuits"],
            "z3k_config": {
                "heating_circuits": [{"id": 1, "name": "Living room"}],
                "heating_modes": [
                    {"id": 10, "name": "Comfort", "zones": [{"circuit": 1, "adjusting_sensor": 5}]},
                    {"id": 11, "name": "Off", "zones": [{"circuit": 1, "adjusting_sensor": null}]}
                ]
            }
        }))
    }

    #[test]
    fn resolves_on_and_off_modes() {
        let topo = HeatingTopology::build(&living_room());
        assert_eq!(topo.circuit(ObjectId(1)).map(|c| c.name.as_str()), Some("Living room"));
        assert_eq!(topo.resolve_mode_for_circuit(ObjectId(1), true), ObjectId(10));
        assert_eq!(topo.resolve_mode_for_circuit(ObjectId(1), false), ObjectId(11));
    }

    #[test]
    fn falls_back_to_circuit_id() {
        let topo = HeatingTopology::build(&living_room());
        assert_eq!(topo.resolve_mode_for_circuit(ObjectId(2), true), ObjectId(2));
        assert_eq!(HeatingTopology::default().resolve_mode_for_circuit(ObjectId(1), false), ObjectId(1));
    }

    #[test]
    fn last_claiming_mode_wins() {
        let d = device(json!({
            "id": 100,
            "capabilities": ["has_heating_circuits"],
            "z3k_config": {
                "heating_circuits": [{"id": 1}],
                "heating_modes": [
                    {"id": 10, "zones": [{"circuit": 1, "adjusting_sensor": 5}]},
                    {"id": 12, "zones": [{"circuit": 1, "adjusting_sensor": 6}]}
                ]
            }
        }));
        let topo = HeatingTopology::build(&d);
        assert_eq!(topo.resolve_mode_for_circuit(ObjectId(1), true), ObjectId(12));
    }

    #[test]
    fn ignores_zones_of_unknown_circuits() {
        let d = device(json!({
            "id": 100,
            "capabilities": ["has_heating_circuits"],
            "z3k_config": {
                "heating_circuits": [{"id": 1}],
                "heating_modes": [{"id": 10, "zones": [{"circuit": 9, "adjusting_sensor": 5}, {"circuit": null}]}]
            }
        }));
        let topo = HeatingTopology::build(&d);
        assert_eq!(topo.modes().len(), 1);
        assert_eq!(topo.modes()[0].circuit_on, None);
        assert_eq!(topo.modes()[0].circuit_off, None);
    }

    #[test]
    fn topologies_do_not_leak_between_devices() {
        let first = HeatingTopology::build(&living_room());
        let other = device(json!({
            "id": 200,
            "capabilities": ["has_heating_circuits"],
            "z3k_config": {
                "heating_circuits": [{"id": 3, "name": "Garage"}],
                "heating_modes": [{"id": 30, "zones": [{"circuit": 3, "adjusting_sensor": 4}]}]
            }
        }));
        let second = HeatingTopology::build(&other);
        assert!(second.circuit(ObjectId(1)).is_none());
        assert_eq!(second.resolve_mode_for_circuit(ObjectId(1), true), ObjectId(1));
        assert_eq!(first.resolve_mode_for_circuit(ObjectId(3), true), ObjectId(3));
    }

    #[test]
    fn trackers_without_the_flag_get_no_topology() {
        let d = device(json!({
            "id": 300,
            "device_type": {"code": "ZTC-720"},
            "z3k_config": {"heating_circuits": [{"id": 1}]}
        }));
        assert!(HeatingTopology::build(&d).is_empty());
    }
}
