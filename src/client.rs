//! Blocking HTTP client for the ZONT cloud API.
//!
//! - Uses `ureq` (no async); every call is a JSON `POST`.
//! - Authenticates with HTTP basic auth plus the `X-ZONT-Client` header.
//! - Payloads are decoded with `serde_path_to_error` so a malformed response
//!   reports where decoding failed.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::models::command::{Command, Endpoint};
use crate::models::zont::DeviceList;

pub const DEFAULT_BASE_URL: &str = "https://zont-online.ru";

#[derive(Debug)]
pub enum ZontClientError {
    Transport(String),
    /// Credentials were refused.
    Auth { status: u16 },
    Http { status: u16, message: String },
    /// The body was not the structured data we expected.
    Json { path: String, source: serde_json::Error },
    /// The API answered 200 but reported the command as failed.
    Rejected(String),
}

impl ZontClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ZontClientError::Auth { .. })
    }
}

impl core::fmt::Display for ZontClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ZontClientError::Transport(s) => write!(f, "transport error: {}", s),
            ZontClientError::Auth { status } => write!(f, "auth error: http {} (check ZONT credentials)", status),
            ZontClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ZontClientError::Json { path, source } => write!(f, "json error at {}: {}", path, source),
            ZontClientError::Rejected(s) => write!(f, "command rejected: {}", s),
        }
    }
}

impl std::error::Error for ZontClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZontClientError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ureq::Error> for ZontClientError {
    fn from(value: ureq::Error) -> Self {
        ZontClientError::Transport(value.to_string())
    }
}

/// The vendor operations the poller and the write handler depend on.
pub trait ZontApi {
    /// Cheap authenticated call used to decide whether a cycle can proceed.
    fn probe(&self) -> Result<(), ZontClientError>;

    /// Full device list including live IO state.
    fn get_devices(&self) -> Result<DeviceList, ZontClientError>;

    /// Send a command and return the acknowledgement object.
    fn send(&self, command: &Command) -> Result<Value, ZontClientError>;
}

pub struct ZontClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
    client_id: String,
}

impl ZontClient {
    pub fn new(base_url: &str, username: &str, password: &str, client_id: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        ZontClient {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password))),
            client_id: client_id.to_string(),
        }
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, endpoint: Endpoint, body: &B) -> Result<T, ZontClientError> {
        let mut res = self
            .agent
            .post(&self.url(endpoint))
            .header("Accept", "application/json")
            .header("Authorization", self.authorization.as_str())
            .header("X-ZONT-Client", self.client_id.as_str())
            .send_json(body)?;

        let status = res.status();
        let text = res.body_mut().read_to_string()?;
        if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
            return Err(ZontClientError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = if text.trim().is_empty() {
                String::from("<no body>")
            } else {
                text
            };
            return Err(ZontClientError::Http {
                status: status.as_u16(),
                message,
            });
        }
        decode(&text)
    }
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ZontClientError> {
    let de = &mut serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(de).map_err(|e| ZontClientError::Json {
        path: e.path().to_string(),
        source: e.into_inner(),
    })
}

/// `{"ok": false, ...}` acknowledgements are failures even with a 200 status.
fn check_ack(ack: Value) -> Result<Value, ZontClientError> {
    if ack.get("ok").and_then(Value::as_bool) == Some(false) {
        let reason = ack
            .get("error_ui")
            .or_else(|| ack.get("error"))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| String::from("<no reason>"));
        return Err(ZontClientError::Rejected(reason));
    }
    Ok(ack)
}

impl ZontApi for ZontClient {
    fn probe(&self) -> Result<(), ZontClientError> {
        self.post_json::<_, Value>(Endpoint::Devices, &json!({ "load_io": false }))
            .map(|_| ())
    }

    fn get_devices(&self) -> Result<DeviceList, ZontClientError> {
        self.post_json(Endpoint::Devices, &json!({ "load_io": true }))
    }

    fn send(&self, command: &Command) -> Result<Value, ZontClientError> {
        let ack = self.post_json::<_, Value>(command.endpoint, &command.body)?;
        check_ack(ack)
    }
}
