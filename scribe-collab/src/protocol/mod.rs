//! Symmetric wire protocol: one message model, two codecs.
//!
//! Binary layout (header is fixed, payload is UTF-8 JSON):
//! ```text
//! ┌───────────┬────────────────┬────────────────┬─────────────┐
//! │ type code │ timestamp      │ payload length │ payload     │
//! │ 1 byte    │ 8 bytes (i64)  │ 4 bytes (u32)  │ JSON map    │
//! │           │ big-endian ms  │ big-endian     │ UTF-8       │
//! └───────────┴────────────────┴────────────────┴─────────────┘
//! ```
//!
//! The JSON codec serializes the same message as one flattened text
//! object. Both directions of both codecs are information-preserving:
//! `decode(encode(m))` keeps type, id, timestamp, and every payload
//! key/value. Any peer implementing the same type-code table and byte
//! layout interoperates regardless of language.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod binary;
pub mod json;

pub use binary::BinaryCodec;
pub use json::JsonCodec;

/// Message kinds and their single-byte wire codes.
///
/// The code table is exhaustive and must match exactly on both ends of
/// a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Auth,
    AuthSuccess,
    AuthError,
    Subscribe,
    Unsubscribe,
    SyncRequest,
    SyncResponse,
    Delta,
    Ack,
    Ping,
    Pong,
    Error,
}

impl MessageType {
    /// Wire code for the binary header.
    pub const fn code(self) -> u8 {
        match self {
            Self::Auth => 0x01,
            Self::AuthSuccess => 0x02,
            Self::AuthError => 0x03,
            Self::Subscribe => 0x10,
            Self::Unsubscribe => 0x11,
            Self::SyncRequest => 0x12,
            Self::SyncResponse => 0x13,
            Self::Delta => 0x20,
            Self::Ack => 0x21,
            Self::Ping => 0x30,
            Self::Pong => 0x31,
            Self::Error => 0xFF,
        }
    }

    /// Reverse lookup for decode. Unknown codes are handled by the
    /// caller (they degrade to an `Error` message, never a panic).
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::Auth,
            0x02 => Self::AuthSuccess,
            0x03 => Self::AuthError,
            0x10 => Self::Subscribe,
            0x11 => Self::Unsubscribe,
            0x12 => Self::SyncRequest,
            0x13 => Self::SyncResponse,
            0x20 => Self::Delta,
            0x21 => Self::Ack,
            0x30 => Self::Ping,
            0x31 => Self::Pong,
            0xFF => Self::Error,
            _ => return None,
        })
    }

    /// Snake_case tag used by the JSON codec.
    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::AuthSuccess => "auth_success",
            Self::AuthError => "auth_error",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::SyncRequest => "sync_request",
            Self::SyncResponse => "sync_response",
            Self::Delta => "delta",
            Self::Ack => "ack",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "auth" => Self::Auth,
            "auth_success" => Self::AuthSuccess,
            "auth_error" => Self::AuthError,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "sync_request" => Self::SyncRequest,
            "sync_response" => Self::SyncResponse,
            "delta" => Self::Delta,
            "ack" => Self::Ack,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            _ => return None,
        })
    }
}

/// A transport payload, tagged with its kind so the right codec can be
/// selected per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl WireFrame {
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level protocol message.
///
/// `id` is process-unique; `timestamp` is milliseconds since epoch and
/// not monotonic across peers. `payload` is the open key/value map the
/// message type carries.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub msg_type: MessageType,
    pub id: String,
    pub timestamp: i64,
    pub payload: Map<String, Value>,
}

impl WireMessage {
    /// Create a message with a fresh id and the current timestamp.
    pub fn new(msg_type: MessageType, payload: Map<String, Value>) -> Self {
        Self {
            msg_type,
            id: Uuid::new_v4().to_string(),
            timestamp: crate::now_ms(),
            payload,
        }
    }

    /// Create with explicit id and timestamp (replay, tests, peers).
    pub fn with_parts(
        msg_type: MessageType,
        id: impl Into<String>,
        timestamp: i64,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            msg_type,
            id: id.into(),
            timestamp,
            payload,
        }
    }

    /// Build from a JSON value in either client shape.
    ///
    /// Accepts the flattened shape (`{type, id?, timestamp?, ...fields}`)
    /// and the nested shape (`{type, id?, timestamp?, payload: {...}}`).
    /// Both produce the same message and therefore the same bytes from
    /// either codec. A missing id gets a generated one; a missing
    /// timestamp gets the current time.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let mut map = match value {
            Value::Object(m) => m,
            other => {
                return Err(ProtocolError::Deserialization(format!(
                    "message must be a JSON object, got {other}"
                )))
            }
        };

        let type_name = match map.remove("type") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(ProtocolError::Deserialization(
                    "message `type` must be a string".into(),
                ))
            }
            None => return Err(ProtocolError::MissingField("type")),
        };
        let msg_type = MessageType::from_name(&type_name)
            .ok_or(ProtocolError::UnknownType(type_name))?;

        let id = match map.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => Uuid::new_v4().to_string(),
        };
        let timestamp = match map.remove("timestamp") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_else(crate::now_ms),
            _ => crate::now_ms(),
        };

        // Nested shape: exactly one remaining `payload` object.
        let payload = match map.remove("payload") {
            Some(Value::Object(nested)) if map.is_empty() => nested,
            Some(other) => {
                // Flattened message that happens to carry a `payload`
                // field; keep it as an ordinary entry.
                map.insert("payload".into(), other);
                map
            }
            None => map,
        };

        Ok(Self {
            msg_type,
            id,
            timestamp,
            payload,
        })
    }
}

/// One shared contract for both codecs.
pub trait WireCodec {
    /// Protocol identifier: `"json"` or `"binary"`.
    fn name(&self) -> &'static str;

    fn encode(&self, message: &WireMessage) -> Result<WireFrame, ProtocolError>;

    fn decode(&self, frame: &WireFrame) -> Result<WireMessage, ProtocolError>;
}

/// Decode a frame with the codec matching its kind.
///
/// Transports deliver frames tagged binary-or-text; this is the
/// per-connection adapter selection point.
pub fn decode_frame(frame: &WireFrame) -> Result<WireMessage, ProtocolError> {
    match frame {
        WireFrame::Text(_) => JsonCodec.decode(frame),
        WireFrame::Binary(_) => BinaryCodec.decode(frame),
    }
}

/// Protocol errors.
///
/// Malformed input is a hard error the transport must surface; only an
/// unknown type code degrades gracefully (to a synthesized `error`
/// message, inside `BinaryCodec::decode`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Wrong frame kind for this codec (text vs binary).
    InputKind { codec: &'static str },
    /// Binary buffer shorter than the fixed header.
    Truncated { len: usize },
    /// Declared payload length exceeds the bytes actually present.
    LengthMismatch { declared: usize, available: usize },
    /// Unrecognized textual message type.
    UnknownType(String),
    MissingField(&'static str),
    Serialization(String),
    Deserialization(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputKind { codec } => {
                write!(f, "wrong input kind for {codec} codec")
            }
            Self::Truncated { len } => {
                write!(f, "buffer too short for header: {len} bytes")
            }
            Self::LengthMismatch {
                declared,
                available,
            } => write!(
                f,
                "declared payload length {declared} exceeds available {available} bytes"
            ),
            Self::UnknownType(name) => write!(f, "unknown message type {name:?}"),
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
