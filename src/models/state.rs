//! Addressable state: structured paths, metadata and values.

use crate::models::zont::{Device, DeviceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const SEPARATOR: char = '.';
const KEY_SEPARATOR: &str = "__";

/// Hierarchical state address made of ordered segments.
///
/// Segments never contain the separator; [`StatePath::segment`] escapes
/// arbitrary text, so `join` and `parse` are inverse of each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StatePath {
            segments: segments.into_iter().map(|s| Self::segment(s.as_ref())).collect(),
        }
    }

    /// Root of a device namespace, `<typeCode>_<id>`.
    pub fn device_root(device: &Device) -> Self {
        Self::new([format!("{}_{}", device.type_code(), device.id.0)])
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let segments = raw.split(SEPARATOR).map(str::to_string).collect::<Vec<_>>();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(StatePath { segments })
    }

    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Self::segment(segment.as_ref()));
        StatePath { segments }
    }

    pub fn join(&self) -> String {
        self.segments.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Device id encoded in the root segment (`<typeCode>_<id>`).
    pub fn device_id(&self) -> Option<DeviceId> {
        let root = self.segments.first()?;
        let (_, id) = root.rsplit_once('_')?;
        id.parse::<i64>().ok().map(DeviceId)
    }

    /// Make arbitrary text safe to use as one segment.
    ///
    /// The separator, whitespace and `%` are percent-escaped, so
    /// [`StatePath::decode_segment`] recovers the original text.
    pub fn segment(raw: &str) -> String {
        if raw.is_empty() {
            return "_".to_string();
        }
        escape(raw, |c| c == SEPARATOR || c.is_whitespace())
    }

    /// Original text of a segment built by [`StatePath::segment`].
    pub fn decode_segment(segment: &str) -> Option<String> {
        unescape(segment)
    }
}

const ESCAPE: char = '%';

fn escape(raw: &str, reserved: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ESCAPE || reserved(c) {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE as u8 {
            let hex = escaped.get(i + 1..i + 3).filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

// =====================
// Composite segment keys
// =====================

/// `prefix__a__b...`. Parts have `_` escaped so they can never contain the
/// key separator.
pub fn compound_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = prefix.to_string();
    for p in parts {
        key.push_str(KEY_SEPARATOR);
        key.push_str(&escape(p, |c| c == '_'));
    }
    key
}

/// Inverse of [`compound_key`] applied to a path segment; `None` when the
/// prefix does not match.
pub fn split_compound_key(prefix: &str, segment: &str) -> Option<Vec<String>> {
    let key = StatePath::decode_segment(segment)?;
    let rest = key.strip_prefix(prefix)?.strip_prefix(KEY_SEPARATOR)?;
    rest.split(KEY_SEPARATOR)
        .map(|p| if p.is_empty() { None } else { unescape(p) })
        .collect()
}

/// `circuit_<id>`, `sensor_<id>` and friends.
pub fn object_key(kind: &str, id: i64) -> String {
    format!("{kind}_{id}")
}

pub fn parse_object_key(kind: &str, key: &str) -> Option<i64> {
    key.strip_prefix(kind)?.strip_prefix('_')?.parse().ok()
}

// =====================
// Metadata
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMeta {
    pub name: String,
    pub role: String,
    pub value_type: ValueType,
    pub unit: Option<String>,
    /// Enumerated labels: raw value -> display label.
    pub states: Option<BTreeMap<String, String>>,
    pub writable: bool,
}

impl StateMeta {
    pub fn new(name: impl Into<String>, role: &str, value_type: ValueType) -> Self {
        StateMeta {
            name: name.into(),
            role: role.to_string(),
            value_type,
            unit: None,
            states: None,
            writable: false,
        }
    }

    pub fn boolean(name: impl Into<String>, role: &str) -> Self {
        Self::new(name, role, ValueType::Boolean)
    }

    pub fn number(name: impl Into<String>, role: &str) -> Self {
        Self::new(name, role, ValueType::Number)
    }

    pub fn string(name: impl Into<String>, role: &str) -> Self {
        Self::new(name, role, ValueType::String)
    }

    pub fn temperature(name: impl Into<String>) -> Self {
        Self::number(name, "value.temperature").unit("°C")
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn labels(mut self, states: BTreeMap<String, String>) -> Self {
        self.states = Some(states);
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// One `(path, value, metadata)` triple to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub path: StatePath,
    pub value: Value,
    pub meta: StateMeta,
}

impl StateEntry {
    pub fn new(path: StatePath, value: impl Into<Value>, meta: StateMeta) -> Self {
        StateEntry {
            path,
            value: value.into(),
            meta,
        }
    }
}

/// A state change observed in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteEvent {
    pub path: StatePath,
    pub value: Value,
    /// `false` for user-originated writes awaiting translation.
    pub ack: bool,
}

pub fn connection_path() -> StatePath {
    StatePath::new(["info", "connection"])
}

pub fn connection_meta() -> StateMeta {
    StateMeta::boolean("Connected to ZONT cloud", "indicator.connected")
}
