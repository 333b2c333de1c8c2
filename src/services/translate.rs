//! Turns a user write on a state path back into a vendor command.

use crate::models::command::{Command, Endpoint, io_ports, z3k_commands};
use crate::models::state::{StatePath, parse_object_key, split_compound_key};
use crate::models::zont::{DeviceId, ObjectId};
use crate::services::topology::HeatingTopology;
use crate::utils::{id_value, value_as_bool, value_as_f64};
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::{Map, Value, json};

/// Build the command for a write of `value` to `path`.
///
/// `topology` must be the one built for the device the path belongs to.
/// Paths without a matching pattern, or values that cannot be coerced,
/// yield `None`.
pub fn translate(path: &StatePath, value: &Value, topology: &HeatingTopology, now: DateTime<Utc>) -> Option<Command> {
    let device_id = path.device_id()?;
    let last = path.last()?;
    // Depth below the device root.
    let depth = path.segments().len() - 1;

    let command = match (depth, last) {
        (1, "thermostat_mode") => update_device(device_id, last, value.clone()),
        (1, "thermostat_ext_mode") => {
            let mode = match value {
                Value::String(s) => id_value(s),
                other => other.clone(),
            };
            update_device(device_id, last, mode)
        }
        (1, "guard" | "siren" | "engine_block" | "webasto" | "auto_ignition") => io_port(device_id, last, value)?,
        (1, key) if split_compound_key("thermostat_temp", key).is_some() => {
            let parts = split_compound_key("thermostat_temp", key)?;
            mode_temperature(device_id, &parts, value_as_f64(value)?)?
        }
        (1, key) if split_compound_key("target_temp", key).is_some() => {
            let parts = split_compound_key("target_temp", key)?;
            let [zone] = parts.as_slice() else { return None };
            let temp = value_as_f64(value)?;
            let mut zones = Map::new();
            zones.insert(zone.clone(), json!({"manual": true, "temp": temp}));
            update_device(device_id, "thermostat_target_temps", Value::Object(zones))
        }
        _ => heating_circuit(path, device_id, value, topology, now)?,
    };

    debug!("Translate: {} -> {} {}", path, command.endpoint.path(), command.body);
    Some(command)
}

fn update_device(device_id: DeviceId, field: &str, value: Value) -> Command {
    let mut body = Map::new();
    body.insert("device_id".to_string(), json!(device_id.0));
    body.insert(field.to_string(), value);
    Command {
        device_id,
        endpoint: Endpoint::UpdateDevice,
        body: Value::Object(body),
    }
}

fn mode_temperature(device_id: DeviceId, parts: &[String], temp: f64) -> Option<Command> {
    match parts {
        [mode] => {
            let mut temps = Map::new();
            temps.insert(mode.clone(), json!(temp));
            Some(update_device(device_id, "thermostat_mode_temps", Value::Object(temps)))
        }
        [mode, zone] => {
            let mut zone_temp = Map::new();
            zone_temp.insert(zone.clone(), json!(temp));
            let mut modes = Map::new();
            modes.insert(mode.clone(), json!({ "zone_temp": zone_temp }));
            Some(update_device(device_id, "thermostat_ext_modes_config", Value::Object(modes)))
        }
        _ => None,
    }
}

/// `heatingCircuits.circuit_<id>[.<leaf>]` under the device root.
fn heating_circuit(
    path: &StatePath,
    device_id: DeviceId,
    value: &Value,
    topology: &HeatingTopology,
    now: DateTime<Utc>,
) -> Option<Command> {
    let segs = &path.segments()[1..];
    let (circuit_key, leaf) = match segs {
        [group, circuit] if group == "heatingCircuits" => (circuit.as_str(), "state"),
        [group, circuit, leaf] if group == "heatingCircuits" => (circuit.as_str(), leaf.as_str()),
        _ => return None,
    };
    let circuit = ObjectId(parse_object_key("circuit", circuit_key)?);

    if leaf == "target_temp" {
        let temp = value_as_f64(value)?;
        return Some(z3k_command(
            device_id,
            z3k_commands::SET_TARGET_TEMP,
            circuit,
            json!({ "value": temp }),
            true,
            now,
        ));
    }

    if leaf != "state" {
        return None;
    }
    let desired_on = value_as_bool(value)?;
    let mode = topology.resolve_mode_for_circuit(circuit, desired_on);
    debug!(
        "Translate: circuit {} {} -> mode {}",
        circuit.0,
        if desired_on { "on" } else { "off" },
        mode.0
    );
    Some(z3k_command(
        device_id,
        z3k_commands::SELECT_HEATING_MODE,
        mode,
        Value::Null,
        false,
        now,
    ))
}

fn z3k_command(
    device_id: DeviceId,
    name: &str,
    object: ObjectId,
    args: Value,
    guaranteed: bool,
    now: DateTime<Utc>,
) -> Command {
    Command {
        device_id,
        endpoint: Endpoint::SendZ3kCommand,
        body: json!({
            "device_id": device_id.0,
            "command_name": name,
            "object_id": object.0,
            "command_args": args,
            "is_guaranteed": guaranteed,
            "request_time": now.timestamp_millis(),
        }),
    }
}

fn io_port(device_id: DeviceId, key: &str, value: &Value) -> Option<Command> {
    let (portname, kind, port_value) = match key {
        "guard" => {
            let on = value_as_bool(value)?;
            (io_ports::GUARD, "string", json!(if on { "enabled" } else { "disabled" }))
        }
        "siren" => (io_ports::SIREN, "bool", json!(value_as_bool(value)?)),
        "engine_block" => (io_ports::ENGINE_BLOCK, "bool", json!(value_as_bool(value)?)),
        "webasto" => (io_ports::WEBASTO, "bool", json!(value_as_bool(value)?)),
        "auto_ignition" => match value {
            Value::Bool(_) | Value::Number(_) => {
                let on = value_as_bool(value)?;
                (io_ports::AUTO_IGNITION, "string", json!(if on { "engine" } else { "disabled" }))
            }
            Value::String(state) => (io_ports::AUTO_IGNITION, "auto-ignition", json!({ "state": state })),
            Value::Object(_) => (io_ports::AUTO_IGNITION, "auto-ignition", value.clone()),
            _ => return None,
        },
        _ => return None,
    };
    Some(Command {
        device_id,
        endpoint: Endpoint::SetIoPort,
        body: json!({
            "device_id": device_id.0,
            "portname": portname,
            "type": kind,
            "value": port_value,
        }),
    })
}
