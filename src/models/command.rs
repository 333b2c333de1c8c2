//! Outbound vendor commands.

use crate::models::zont::DeviceId;
use serde_json::Value;
use std::time::Duration;

/// The vendor operations this service issues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Devices,
    UpdateDevice,
    SetIoPort,
    SendZ3kCommand,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Devices => "/api/devices",
            Endpoint::UpdateDevice => "/api/update_device",
            Endpoint::SetIoPort => "/api/set_io_port",
            Endpoint::SendZ3kCommand => "/api/send_z3k_command",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub device_id: DeviceId,
    pub endpoint: Endpoint,
    pub body: Value,
}

impl Command {
    /// How long to wait before re-polling once the command is acknowledged.
    /// IO ports go through the device hardware and need time to settle.
    pub fn repoll_delay(&self, io_settle: Duration) -> Duration {
        match self.endpoint {
            Endpoint::SetIoPort => io_settle,
            _ => Duration::ZERO,
        }
    }
}

pub mod z3k_commands {
    pub const SET_TARGET_TEMP: &str = "SetTargetTemp";
    pub const SELECT_HEATING_MODE: &str = "SelectHeatingMode";
}

pub mod io_ports {
    pub const GUARD: &str = "guard-state";
    pub const SIREN: &str = "siren";
    pub const ENGINE_BLOCK: &str = "engine-block";
    pub const WEBASTO: &str = "webasto";
    pub const AUTO_IGNITION: &str = "auto-ignition";
}
