use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Nominal battery voltage of ZONT radio sensors (two AA cells).
pub const BATTERY_NOMINAL_VOLTS: f64 = 3.0;

/// Lenient boolean reading of a written or reported value.
///
/// Accepts booleans, numbers (non-zero is `true`) and the usual on/off strings.
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "enabled" => Some(true),
            "false" | "off" | "0" | "disabled" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Numeric strings become numbers so ids round-trip in the type the vendor uses.
pub fn id_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(raw),
    }
}

/// Raw battery voltage scaled against `nominal`, clamped to `0..=100` percent.
pub fn battery_percent(volts: f64, nominal: f64) -> f64 {
    if !volts.is_finite() || volts <= 0.0 || nominal <= 0.0 {
        return 0.0;
    }
    (volts / nominal * 100.0).min(100.0).round()
}

/// Unix seconds as RFC 3339, `None` when out of range.
pub fn unix_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
