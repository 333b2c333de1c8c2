//! Flattens one device snapshot into the `(path, value, metadata)` triples to publish.
//!
//! Each area of the snapshot is handled by an independent [`Extractor`] that
//! declares the capability flags it needs. An extractor whose flags are not
//! all present emits nothing; a missing snapshot field omits just that path.
//! Output order is stable for a given snapshot and capability set.

use crate::capabilities::{CapabilitySet, classify, flags};
use crate::models::state::{StateEntry, StateMeta, StatePath, ValueType, compound_key, object_key};
use crate::models::zont::{Device, Io, ObjectId, OtState, Z3kObject, Z3kObjectState};
use crate::services::topology::HeatingTopology;
use crate::utils::{BATTERY_NOMINAL_VOLTS, battery_percent, unix_to_rfc3339, value_as_bool};
use log::trace;
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything an extractor may look at for one device.
pub struct Context<'a> {
    pub device: &'a Device,
    pub caps: &'a CapabilitySet,
    pub topology: &'a HeatingTopology,
    pub root: StatePath,
}

impl Context<'_> {
    fn io(&self) -> Option<&Io> {
        self.device.io.as_ref()
    }

    fn z3k_state(&self) -> impl Iterator<Item = (ObjectId, &Z3kObjectState)> {
        self.io()
            .and_then(|io| io.z3k_state.as_ref())
            .into_iter()
            .flat_map(|m| m.iter())
            .filter_map(|(k, v)| ObjectId::parse(k).map(|id| (id, v)))
    }
}

pub struct Extractor {
    pub name: &'static str,
    /// All of these must be reported by the device.
    pub requires: &'static [&'static str],
    pub extract: fn(&Context<'_>, &mut Vec<StateEntry>),
}

impl Extractor {
    pub fn applies(&self, caps: &CapabilitySet) -> bool {
        self.requires.iter().all(|f| caps.contains(f))
    }
}

pub const EXTRACTORS: &[Extractor] = &[
    Extractor { name: "thermometers", requires: &[flags::THERMOMETERS], extract: thermometers },
    Extractor { name: "thermostat", requires: &[flags::THERMOSTAT], extract: thermostat },
    Extractor { name: "heating_circuits", requires: &[flags::HEATING_CIRCUITS], extract: heating_circuits },
    Extractor { name: "radio_sensors", requires: &[flags::RADIO_SENSORS], extract: radio_sensors },
    Extractor { name: "wired_sensors", requires: &[flags::WIRED_SENSORS], extract: wired_sensors },
    Extractor { name: "opentherm", requires: &[flags::OPENTHERM], extract: opentherm },
    Extractor { name: "guard", requires: &[flags::GUARD], extract: guard },
    Extractor { name: "siren", requires: &[flags::SIREN], extract: siren },
    Extractor { name: "car", requires: &[flags::CAR_STATE], extract: car },
    Extractor { name: "gps", requires: &[flags::GPS], extract: gps },
    Extractor { name: "voltage", requires: &[flags::VOLTAGE], extract: voltage },
    Extractor { name: "engine_block", requires: &[flags::ENGINE_BLOCK], extract: engine_block },
    Extractor { name: "webasto", requires: &[flags::WEBASTO], extract: webasto },
    Extractor { name: "auto_ignition", requires: &[flags::AUTO_IGNITION], extract: auto_ignition },
];

pub fn expand(device: &Device, caps: &CapabilitySet, topology: &HeatingTopology) -> Vec<StateEntry> {
    let ctx = Context {
        device,
        caps,
        topology,
        root: StatePath::device_root(device),
    };

    let mut out = vec![
        StateEntry::new(
            ctx.root.child("name"),
            device.display_name(),
            StateMeta::string("Device name", "info.name"),
        ),
        StateEntry::new(
            ctx.root.child("class"),
            classify(device.type_code()).as_str(),
            StateMeta::string("Device class", "info.type"),
        ),
    ];
    for extractor in EXTRACTORS {
        if extractor.applies(caps) {
            let before = out.len();
            (extractor.extract)(&ctx, &mut out);
            trace!("Expand: device {} {} -> {} path(s)", device.id.0, extractor.name, out.len() - before);
        }
    }
    out
}

// =====================
// Heating
// =====================

fn thermometers(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let Some(list) = ctx.device.thermometers.as_ref() else { return };
    let base = ctx.root.child("thermometers");
    for t in list.iter().filter(|t| t.is_assigned_to_slot) {
        let Some(value) = t.last_value else { continue };
        let name = t.name.clone().unwrap_or_else(|| t.uuid.clone());
        out.push(StateEntry::new(base.child(&t.uuid), value, StateMeta::temperature(name)));
    }
}

const LEGACY_MODE_LABELS: &[(&str, &str)] = &[
    ("comfort", "Comfort"),
    ("econom", "Economy"),
    ("schedule", "Schedule"),
    ("idle", "Anti-freeze"),
];

fn legacy_mode_label(key: &str) -> String {
    LEGACY_MODE_LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| key.to_string())
}

fn thermostat(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let d = ctx.device;
    match d.thermostat_ext_modes_config.as_ref() {
        Some(ext) => {
            let active = ext.iter().filter(|(_, m)| m.active).collect::<Vec<_>>();
            if let Some(mode) = d.thermostat_ext_mode.as_ref() {
                let labels = active
                    .iter()
                    .map(|(id, m)| (id.to_string(), m.name.clone().unwrap_or_else(|| id.to_string())))
                    .collect::<BTreeMap<_, _>>();
                let value_type = if mode.is_number() { ValueType::Number } else { ValueType::String };
                out.push(StateEntry::new(
                    ctx.root.child("thermostat_ext_mode"),
                    mode.clone(),
                    StateMeta::new("Thermostat mode", "level.mode", value_type).labels(labels).writable(),
                ));
            }
            for (mode_id, mode) in active {
                let mode_name = mode.name.clone().unwrap_or_else(|| mode_id.to_string());
                for (zone_id, temp) in &mode.zone_temp {
                    let Some(temp) = temp else { continue };
                    out.push(StateEntry::new(
                        ctx.root.child(compound_key("thermostat_temp", &[mode_id.as_str(), zone_id.as_str()])),
                        *temp,
                        StateMeta::temperature(format!("{mode_name}, zone {zone_id}")).writable(),
                    ));
                }
            }
        }
        None => {
            let temps = d.thermostat_mode_temps.as_ref();
            if let Some(mode) = d.thermostat_mode.as_ref() {
                let mut labels = temps
                    .map(|t| t.keys().map(|k| (k.clone(), legacy_mode_label(k))).collect::<BTreeMap<_, _>>())
                    .unwrap_or_default();
                labels.entry(mode.clone()).or_insert_with(|| legacy_mode_label(mode));
                out.push(StateEntry::new(
                    ctx.root.child("thermostat_mode"),
                    mode.as_str(),
                    StateMeta::string("Thermostat mode", "level.mode").labels(labels).writable(),
                ));
            }
            for (mode, temp) in temps.into_iter().flatten() {
                let Some(temp) = temp else { continue };
                out.push(StateEntry::new(
                    ctx.root.child(compound_key("thermostat_temp", &[mode.as_str()])),
                    *temp,
                    StateMeta::temperature(format!("{} temperature", legacy_mode_label(mode))).writable(),
                ));
            }
        }
    }

    match d.zones.as_deref() {
        Some(zones) if !zones.is_empty() => {
            for zone in zones {
                let Some(temp) = zone.target_temp else { continue };
                let key = zone.key();
                let name = zone.name.clone().unwrap_or_else(|| format!("Zone {key}"));
                out.push(StateEntry::new(
                    ctx.root.child(compound_key("target_temp", &[key.as_str()])),
                    temp,
                    StateMeta::number(format!("{name} target"), "level.temperature")
                        .unit("°C")
                        .writable(),
                ));
            }
        }
        _ => {
            if let Some(temp) = d.target_temp {
                out.push(StateEntry::new(
                    ctx.root.child("target_temp"),
                    temp,
                    StateMeta::temperature("Target temperature"),
                ));
            }
        }
    }
}

fn heating_circuits(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let base = ctx.root.child("heatingCircuits");
    for (id, state) in ctx.z3k_state() {
        let Some(circuit) = ctx.topology.circuit(id) else { continue };
        let node = base.child(object_key("circuit", id.0));
        if let Some(on) = state.status.as_ref().and_then(value_as_bool) {
            out.push(StateEntry::new(
                node.child("state"),
                on,
                StateMeta::boolean(format!("{} on", circuit.name), "switch").writable(),
            ));
        }
        out.push(StateEntry::new(
            node.child("target_temp"),
            state.target_temp.unwrap_or(0.0),
            StateMeta::number(format!("{} target", circuit.name), "level.temperature")
                .unit("°C")
                .writable(),
        ));
    }
}

// =====================
// z3k sensors
// =====================

fn configured<'a>(list: Option<&'a Vec<Z3kObject>>, id: ObjectId) -> Option<&'a Z3kObject> {
    list.and_then(|l| l.iter().find(|o| o.id == id))
}

fn radio_sensors(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let cfg = ctx.device.z3k_config.as_ref().map(|c| &c.radiosensors);
    let base = ctx.root.child("radioSensors");
    for (id, state) in ctx.z3k_state() {
        let Some(sensor) = configured(cfg, id) else { continue };
        if state.sensor_ok != Some(true) {
            continue;
        }
        let name = sensor.name.clone().unwrap_or_else(|| format!("Radio sensor {}", id.0));
        let node = base.child(object_key("sensor", id.0));
        if let Some(t) = state.curr_temp {
            out.push(StateEntry::new(node.child("temperature"), t, StateMeta::temperature(&name)));
        }
        if let Some(volts) = state.battery {
            out.push(StateEntry::new(
                node.child("battery"),
                battery_percent(volts, BATTERY_NOMINAL_VOLTS),
                StateMeta::number(format!("{name} battery"), "value.battery").unit("%"),
            ));
        }
        if let Some(h) = state.humidity {
            out.push(StateEntry::new(
                node.child("humidity"),
                h,
                StateMeta::number(format!("{name} humidity"), "value.humidity").unit("%"),
            ));
        }
        if let Some(rssi) = state.rssi {
            out.push(StateEntry::new(
                node.child("rssi"),
                rssi,
                StateMeta::number(format!("{name} signal"), "value.rssi").unit("dBm"),
            ));
        }
    }
}

fn wired_sensors(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let cfg = ctx.device.z3k_config.as_ref().map(|c| &c.wired_temperature_sensors);
    let base = ctx.root.child("wiredSensors");
    for (id, state) in ctx.z3k_state() {
        let Some(sensor) = configured(cfg, id) else { continue };
        if state.sensor_ok != Some(true) {
            continue;
        }
        let Some(t) = state.curr_temp else { continue };
        let name = sensor.name.clone().unwrap_or_else(|| format!("Wired sensor {}", id.0));
        out.push(StateEntry::new(
            base.child(object_key("sensor", id.0)).child("temperature"),
            t,
            StateMeta::temperature(name),
        ));
    }
}

/// Flame-on flag in the OpenTherm status list.
const OT_FLAME_FLAG: &str = "fl";

pub fn burner_active(flags: &[String]) -> bool {
    flags.iter().any(|f| f == OT_FLAME_FLAG)
}

fn opentherm(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let adapters = ctx.device.z3k_config.as_ref().map(|c| &c.boiler_adapters);
    let base = ctx.root.child("opentherm");
    for (id, state) in ctx.z3k_state() {
        let Some(ot) = state.ot.as_ref() else { continue };
        let name = configured(adapters, id)
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| format!("Boiler {}", id.0));
        push_ot(&base.child(object_key("boiler", id.0)), &name, ot, out);
    }
}

fn push_ot(node: &StatePath, name: &str, ot: &OtState, out: &mut Vec<StateEntry>) {
    let temps = [
        ("target_water_temp", "target water temperature", ot.dt),
        ("water_temp", "water temperature", ot.bt),
        ("dhw_temp", "DHW temperature", ot.dhw_t),
        ("return_temp", "return temperature", ot.rt),
        ("outdoor_temp", "outdoor temperature", ot.ot),
    ];
    for (key, label, value) in temps {
        if let Some(v) = value {
            out.push(StateEntry::new(node.child(key), v, StateMeta::temperature(format!("{name} {label}"))));
        }
    }
    if let Some(v) = ot.rml {
        out.push(StateEntry::new(
            node.child("modulation"),
            v,
            StateMeta::number(format!("{name} modulation"), "value").unit("%"),
        ));
    }
    if let Some(v) = ot.wp {
        out.push(StateEntry::new(
            node.child("pressure"),
            v,
            StateMeta::number(format!("{name} pressure"), "value.pressure").unit("bar"),
        ));
    }
    if let Some(v) = ot.fr {
        out.push(StateEntry::new(
            node.child("dhw_flow_rate"),
            v,
            StateMeta::number(format!("{name} DHW flow"), "value.flow").unit("l/min"),
        ));
    }
    if let Some(s) = ot.s.as_deref() {
        out.push(StateEntry::new(
            node.child("burner_active"),
            burner_active(s),
            StateMeta::boolean(format!("{name} burner"), "indicator.working"),
        ));
    }
    if let Some(code) = ot.ff.as_ref().and_then(|f| f.c) {
        out.push(StateEntry::new(
            node.child("fault_code"),
            code,
            StateMeta::number(format!("{name} fault code"), "value.error"),
        ));
    }
}

// =====================
// Alarm / car / tracker
// =====================

fn guard(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let Some(state) = ctx.io().and_then(|io| io.guard_state.as_deref()) else { return };
    out.push(StateEntry::new(
        ctx.root.child("guard"),
        state == "enabled",
        StateMeta::boolean("Guard", "switch").writable(),
    ));
}

fn io_switch(ctx: &Context<'_>, out: &mut Vec<StateEntry>, key: &str, name: &str, value: Option<bool>) {
    if let Some(v) = value {
        out.push(StateEntry::new(ctx.root.child(key), v, StateMeta::boolean(name, "switch").writable()));
    }
}

fn siren(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    io_switch(ctx, out, "siren", "Siren", ctx.io().and_then(|io| io.siren));
}

fn engine_block(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    io_switch(ctx, out, "engine_block", "Engine block", ctx.io().and_then(|io| io.engine_block));
}

fn webasto(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    io_switch(ctx, out, "webasto", "Webasto", ctx.io().and_then(|io| io.webasto));
}

fn car(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let Some(sensors) = ctx.io().and_then(|io| io.car_state.as_ref()) else { return };
    let base = ctx.root.child("car");
    for (key, on) in sensors {
        let Some(on) = on else { continue };
        out.push(StateEntry::new(base.child(key), *on, StateMeta::boolean(key.as_str(), "sensor")));
    }
}

fn gps(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let Some(fix) = ctx.io().and_then(|io| io.last_gps.as_ref()) else { return };
    let base = ctx.root.child("gps");
    if let Some(lat) = fix.y {
        out.push(StateEntry::new(
            base.child("latitude"),
            lat,
            StateMeta::number("Latitude", "value.gps.latitude").unit("°"),
        ));
    }
    if let Some(lon) = fix.x {
        out.push(StateEntry::new(
            base.child("longitude"),
            lon,
            StateMeta::number("Longitude", "value.gps.longitude").unit("°"),
        ));
    }
    if let Some(speed) = fix.speed {
        out.push(StateEntry::new(
            base.child("speed"),
            speed,
            StateMeta::number("Speed", "value.speed").unit("km/h"),
        ));
    }
    if let Some(time) = fix.time.and_then(unix_to_rfc3339) {
        out.push(StateEntry::new(base.child("time"), time, StateMeta::string("Fix time", "date")));
    }
}

fn voltage(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    if let Some(v) = ctx.io().and_then(|io| io.voltage) {
        out.push(StateEntry::new(
            ctx.root.child("voltage"),
            v,
            StateMeta::number("Supply voltage", "value.voltage").unit("V"),
        ));
    }
}

const AUTO_IGNITION_STATES: &[&str] = &["disabled", "enabled", "engine"];

fn auto_ignition(ctx: &Context<'_>, out: &mut Vec<StateEntry>) {
    let Some(raw) = ctx.io().and_then(|io| io.auto_ignition.as_ref()) else { return };
    let path = ctx.root.child("auto_ignition");

    if !ctx.caps.contains(flags::AUTO_IGNITION_STATE) {
        if let Some(on) = value_as_bool(raw) {
            out.push(StateEntry::new(path, on, StateMeta::boolean("Auto ignition", "switch").writable()));
        }
        return;
    }

    let Some(state) = raw.get("state").and_then(Value::as_str) else { return };
    let labels = AUTO_IGNITION_STATES
        .iter()
        .map(|s| (s.to_string(), s.to_string()))
        .collect::<BTreeMap<_, _>>();
    out.push(StateEntry::new(
        path,
        state,
        StateMeta::string("Auto ignition", "level.mode").labels(labels).writable(),
    ));
    let until = match raw.get("until") {
        Some(Value::Number(n)) => n.as_i64().and_then(unix_to_rfc3339).map(Value::from),
        Some(Value::String(s)) => Some(Value::from(s.as_str())),
        _ => None,
    };
    if let Some(until) = until {
        out.push(StateEntry::new(
            ctx.root.child("auto_ignition_until"),
            until,
            StateMeta::string("Auto ignition until", "date"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::zont::DeviceList;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn load_fixture() -> DeviceList {
        let json = std::fs::read_to_string("tests/data/devices.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse device list")
    }

    fn device(code: &str) -> Device {
        load_fixture()
            .devices
            .into_iter()
            .find(|d| d.type_code() == code)
            .expect("device in fixture")
    }

    fn run(d: &Device, caps: &CapabilitySet) -> Vec<StateEntry> {
        expand(d, caps, &HeatingTopology::build(d))
    }

    fn paths(entries: &[StateEntry]) -> BTreeSet<String> {
        entries.iter().map(|e| e.path.join()).collect()
    }

    fn value_at<'a>(entries: &'a [StateEntry], path: &str) -> Option<&'a StateEntry> {
        entries.iter().find(|e| e.path.join() == path)
    }

    #[test]
    fn expansion_is_deterministic() {
        for d in load_fixture().devices {
            let caps = CapabilitySet::of(&d);
            assert_eq!(run(&d, &caps), run(&d, &caps));
        }
    }

    #[test]
    fn removing_a_flag_removes_only_its_paths() {
        for d in load_fixture().devices {
            let caps = CapabilitySet::of(&d);
            let topology = HeatingTopology::build(&d);
            let full = paths(&expand(&d, &caps, &topology));
            for extractor in EXTRACTORS {
                for flag in extractor.requires {
                    let reduced = paths(&expand(&d, &caps.without(flag), &topology));
                    let ctx = Context {
                        device: &d,
                        caps: &caps,
                        topology: &topology,
                        root: StatePath::device_root(&d),
                    };
                    let mut own = Vec::new();
                    if extractor.applies(&caps) {
                        (extractor.extract)(&ctx, &mut own);
                    }
                    let removed = full.difference(&reduced).cloned().collect::<BTreeSet<_>>();
                    assert_eq!(removed, paths(&own), "flag {flag} on device {}", d.id.0);
                    assert!(reduced.is_subset(&full));
                }
            }
        }
    }

    #[test]
    fn zoned_thermostat_uses_active_modes_only() {
        let d = device("H2000+");
        let out = run(&d, &CapabilitySet::of(&d));
        let p = paths(&out);
        assert!(p.contains("H2000+_1001.thermostat_temp__1__1"));
        assert!(p.contains("H2000+_1001.thermostat_temp__1__2"));
        // zone 3 has no temperature in mode 1; mode 2 is inactive
        assert!(!p.contains("H2000+_1001.thermostat_temp__1__3"));
        assert!(!p.iter().any(|s| s.contains("thermostat_temp__2__")));
        assert!(p.contains("H2000+_1001.target_temp__1"));
        assert!(!p.contains("H2000+_1001.target_temp"));

        let mode = value_at(&out, "H2000+_1001.thermostat_ext_mode").expect("mode path");
        assert!(mode.meta.writable);
        assert_eq!(mode.meta.value_type, ValueType::Number);
        let labels = mode.meta.states.as_ref().expect("labels");
        assert_eq!(labels.get("1").map(String::as_str), Some("Comfort"));
        assert!(!labels.contains_key("2"));
    }

    #[test]
    fn legacy_thermostat_has_mode_and_temps() {
        let d = device("T102");
        let out = run(&d, &CapabilitySet::of(&d));
        let mode = value_at(&out, "T102_2002.thermostat_mode").expect("mode path");
        assert_eq!(mode.value, json!("comfort"));
        let labels = mode.meta.states.as_ref().expect("labels");
        assert_eq!(labels.get("econom").map(String::as_str), Some("Economy"));
        assert_eq!(value_at(&out, "T102_2002.thermostat_temp__comfort").map(|e| &e.value), Some(&json!(22.5)));
        assert!(value_at(&out, "T102_2002.thermostat_temp__idle").is_none());
        let target = value_at(&out, "T102_2002.target_temp").expect("flat target");
        assert!(!target.meta.writable);
        // unassigned thermometer slot
        assert!(value_at(&out, "T102_2002.thermometers.t-2").is_none());
        assert_eq!(value_at(&out, "T102_2002.thermometers.t-1").map(|e| &e.value), Some(&json!(21.3)));
    }

    #[test]
    fn heating_circuits_normalise_null_target() {
        let d = device("H2000+");
        let out = run(&d, &CapabilitySet::of(&d));
        let state = value_at(&out, "H2000+_1001.heatingCircuits.circuit_1.state").expect("state");
        assert_eq!(state.value, json!(true));
        assert_eq!(state.meta.name, "Living room on");
        assert_eq!(
            value_at(&out, "H2000+_1001.heatingCircuits.circuit_2.target_temp").map(|e| &e.value),
            Some(&json!(0.0))
        );
        // z3k object 99 is not a configured circuit
        assert!(!paths(&out).iter().any(|p| p.contains("circuit_99")));
    }

    #[test]
    fn sensors_require_ok_flag() {
        let d = device("H2000+");
        let out = run(&d, &CapabilitySet::of(&d));
        let p = paths(&out);
        assert!(p.contains("H2000+_1001.radioSensors.sensor_20.temperature"));
        assert_eq!(
            value_at(&out, "H2000+_1001.radioSensors.sensor_20.battery").map(|e| &e.value),
            Some(&json!(100.0))
        );
        assert!(p.contains("H2000+_1001.radioSensors.sensor_20.humidity"));
        assert!(p.contains("H2000+_1001.radioSensors.sensor_20.rssi"));
        assert!(!p.iter().any(|s| s.contains("sensor_21")));
        assert!(p.contains("H2000+_1001.wiredSensors.sensor_30.temperature"));
        assert!(!p.contains("H2000+_1001.wiredSensors.sensor_30.battery"));
    }

    #[test]
    fn opentherm_block_is_optional_per_field() {
        let d = device("H2000+");
        let out = run(&d, &CapabilitySet::of(&d));
        let node = "H2000+_1001.opentherm.boiler_40";
        assert_eq!(value_at(&out, &format!("{node}.burner_active")).map(|e| &e.value), Some(&json!(true)));
        assert_eq!(value_at(&out, &format!("{node}.fault_code")).map(|e| &e.value), Some(&json!(0)));
        assert!(value_at(&out, &format!("{node}.water_temp")).is_some());
        assert!(value_at(&out, &format!("{node}.dhw_flow_rate")).is_none());
    }

    #[test]
    fn burner_flag_detection() {
        assert!(burner_active(&["ch".to_string(), "fl".to_string()]));
        assert!(!burner_active(&["ch".to_string(), "dhw".to_string()]));
        assert!(!burner_active(&[]));
    }

    #[test]
    fn alarm_paths() {
        let d = device("ZTC-720");
        let out = run(&d, &CapabilitySet::of(&d));
        assert_eq!(value_at(&out, "ZTC-720_3003.guard").map(|e| &e.value), Some(&json!(true)));
        assert_eq!(value_at(&out, "ZTC-720_3003.siren").map(|e| &e.value), Some(&json!(false)));
        assert_eq!(value_at(&out, "ZTC-720_3003.car.door").map(|e| &e.value), Some(&json!(false)));
        assert_eq!(value_at(&out, "ZTC-720_3003.gps.latitude").map(|e| &e.value), Some(&json!(55.75)));
        assert_eq!(
            value_at(&out, "ZTC-720_3003.gps.time").map(|e| &e.value),
            Some(&json!("2023-11-14T22:13:20Z"))
        );
        assert_eq!(value_at(&out, "ZTC-720_3003.voltage").map(|e| &e.value), Some(&json!(12.6)));
        // webasto is reported by the flag but missing from io
        assert!(value_at(&out, "ZTC-720_3003.webasto").is_none());
        assert_eq!(value_at(&out, "ZTC-720_3003.class").map(|e| &e.value), Some(&json!("tracker")));
    }

    #[test]
    fn auto_ignition_encodings() {
        let d = device("ZTC-720");
        let caps = CapabilitySet::of(&d);
        let out = run(&d, &caps);
        let rich = value_at(&out, "ZTC-720_3003.auto_ignition").expect("auto ignition");
        assert_eq!(rich.value, json!("engine"));
        assert_eq!(rich.meta.value_type, ValueType::String);
        assert!(value_at(&out, "ZTC-720_3003.auto_ignition_until").is_some());

        let plain: Device = serde_json::from_value(json!({
            "id": 5,
            "device_type": {"code": "A300"},
            "capabilities": ["has_autoignition"],
            "io": {"auto-ignition": true}
        }))
        .expect("device");
        let out = run(&plain, &CapabilitySet::of(&plain));
        let entry = value_at(&out, "A300_5.auto_ignition").expect("auto ignition");
        assert_eq!(entry.value, json!(true));
        assert_eq!(entry.meta.value_type, ValueType::Boolean);
        assert!(value_at(&out, "A300_5.auto_ignition_until").is_none());
    }

    #[test]
    fn auto_ignition_until_string_is_kept_verbatim() {
        let d: Device = serde_json::from_value(json!({
            "id": 6,
            "device_type": {"code": "ZTC-720"},
            "capabilities": ["has_autoignition", "has_autoignition_state"],
            "io": {"auto-ignition": {"state": "enabled", "until": "1700000000"}}
        }))
        .expect("device");
        let out = run(&d, &CapabilitySet::of(&d));
        let until = value_at(&out, "ZTC-720_6.auto_ignition_until").expect("until");
        assert_eq!(until.value, json!("1700000000"));
        assert_eq!(until.meta.value_type, ValueType::String);
    }

    #[test]
    fn bare_device_only_gets_identity() {
        let d: Device = serde_json::from_value(json!({"id": 7, "capabilities": ["has_gps", "has_thermostat"]}))
            .expect("device");
        let out = run(&d, &CapabilitySet::of(&d));
        assert_eq!(paths(&out), BTreeSet::from(["unknown_7.name".to_string(), "unknown_7.class".to_string()]));
    }
}
