//! JSON envelope codec.
//!
//! Every message on the bus is wrapped the same way:
//!
//! ```json
//! { "action": "bottle_event", "source": "drawer_3",
//!   "data": { "event": "placed", "position": 4, "weight": 912.5 },
//!   "timestamp": "2025-10-28T18:15:00Z" }
//! ```
//!
//! Decoding is two-stage.  The loose [`Envelope`] is parsed first so an
//! unknown `action` can be told apart from a malformed payload; then
//! `action` + `data` are decoded into the closed variant set of the
//! channel.

use core::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::app::commands::{AppCommand, DeviceEvent};

/// `source` stamped on everything this service publishes.
pub const SOURCE: &str = "cellarkeeper";

/// Actions accepted on the system command topic.
pub const COMMAND_ACTIONS: &[&str] = &[
    "start_load",
    "start_unload",
    "start_swap",
    "cancel_swap",
    "cancel_load",
    "cancel_unload",
    "retry_placement",
];

/// Actions accepted on a drawer status topic.
pub const DEVICE_ACTIONS: &[&str] = &["bottle_event", "wrong_placement"];

/// Liveness ping from a drawer controller; carries nothing for us.
const HEARTBEAT: &str = "heartbeat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not a JSON envelope at all.
    Malformed(String),
    /// Envelope is fine but nobody handles this action here.
    UnknownAction(String),
    /// Known action, `data` does not fit.
    InvalidPayload { action: String, reason: String },
    /// Outbound value did not serialize to an `action` + `data` pair.
    Encode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed envelope: {}", e),
            Self::UnknownAction(a) => write!(f, "unknown action '{}'", a),
            Self::InvalidPayload { action, reason } => {
                write!(f, "invalid '{}' payload: {}", action, reason)
            }
            Self::Encode(e) => write!(f, "encode failed: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

// ── Decode ───────────────────────────────────────────────────

pub fn decode_envelope(payload: &[u8]) -> Result<Envelope, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.to_string()))
}

fn decode_closed<T: DeserializeOwned>(
    env: Envelope,
    accepted: &[&str],
) -> Result<T, CodecError> {
    if !accepted.contains(&env.action.as_str()) {
        return Err(CodecError::UnknownAction(env.action));
    }
    let data = match env.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(json!({ "action": env.action, "data": data })).map_err(|e| {
        CodecError::InvalidPayload {
            action: env.action,
            reason: e.to_string(),
        }
    })
}

/// Decode a message from the system command topic.
pub fn decode_command(payload: &[u8]) -> Result<AppCommand, CodecError> {
    decode_closed(decode_envelope(payload)?, COMMAND_ACTIONS)
}

/// Decode a message from a drawer status topic.  Heartbeats decode to
/// `None`.
pub fn decode_device_event(payload: &[u8]) -> Result<Option<DeviceEvent>, CodecError> {
    let env = decode_envelope(payload)?;
    if env.action == HEARTBEAT {
        return Ok(None);
    }
    decode_closed(env, DEVICE_ACTIONS).map(Some)
}

// ── Encode ───────────────────────────────────────────────────

/// Wrap an adjacently tagged message into an envelope.
pub fn encode<T: Serialize>(msg: &T, now: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
    let mut value = serde_json::to_value(msg).map_err(|e| CodecError::Encode(e.to_string()))?;
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| CodecError::Encode("missing action tag".into()))?;
    let data = value
        .get_mut("data")
        .map(Value::take)
        .unwrap_or_else(|| Value::Object(Map::new()));

    let env = Envelope {
        action,
        source: SOURCE.to_owned(),
        data,
        timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    };
    serde_json::to_vec(&env).map_err(|e| CodecError::Encode(e.to_string()))
}
