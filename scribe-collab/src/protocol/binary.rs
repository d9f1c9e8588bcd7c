//! Compact binary codec: fixed 13-byte header + UTF-8 JSON payload.
//!
//! Decode is strict about structure (frame kind, header length,
//! declared-vs-actual payload length) and lenient about vocabulary: an
//! unknown type code yields a synthesized `error` message with a
//! diagnostic payload instead of failing, so one bad peer message can
//! never crash the transport.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{MessageType, ProtocolError, WireCodec, WireFrame, WireMessage};

/// Header size: 1-byte type code + 8-byte timestamp + 4-byte length.
pub const HEADER_LEN: usize = 13;

/// The `"binary"` protocol adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    fn synthesize_unknown(code: u8, timestamp: i64) -> WireMessage {
        log::warn!("decoded unknown wire type code 0x{code:02x}");
        let mut payload = Map::new();
        payload.insert(
            "message".into(),
            Value::String(format!("unknown type code 0x{code:02x}")),
        );
        payload.insert("code".into(), Value::from(code));
        WireMessage {
            msg_type: MessageType::Error,
            id: Uuid::new_v4().to_string(),
            timestamp,
            payload,
        }
    }
}

impl WireCodec for BinaryCodec {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn encode(&self, message: &WireMessage) -> Result<WireFrame, ProtocolError> {
        // The id rides inside the payload so a round trip preserves it.
        let mut body = message.payload.clone();
        body.insert("id".into(), Value::String(message.id.clone()));
        let payload_bytes = serde_json::to_vec(&Value::Object(body))
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;

        if payload_bytes.len() > u32::MAX as usize {
            return Err(ProtocolError::Serialization(format!(
                "payload of {} bytes exceeds u32 length field",
                payload_bytes.len()
            )));
        }

        let mut buf = Vec::with_capacity(HEADER_LEN + payload_bytes.len());
        buf.push(message.msg_type.code());
        buf.extend_from_slice(&message.timestamp.to_be_bytes());
        buf.extend_from_slice(&(payload_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload_bytes);
        Ok(WireFrame::Binary(buf))
    }

    fn decode(&self, frame: &WireFrame) -> Result<WireMessage, ProtocolError> {
        let bytes = match frame {
            WireFrame::Binary(b) => b,
            WireFrame::Text(_) => {
                return Err(ProtocolError::InputKind { codec: self.name() })
            }
        };
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated { len: bytes.len() });
        }

        let code = bytes[0];
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[1..9]);
        let timestamp = i64::from_be_bytes(ts);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[9..13]);
        let declared = u32::from_be_bytes(len) as usize;

        let available = bytes.len() - HEADER_LEN;
        if declared > available {
            return Err(ProtocolError::LengthMismatch {
                declared,
                available,
            });
        }

        let msg_type = match MessageType::from_code(code) {
            Some(t) => t,
            None => return Ok(Self::synthesize_unknown(code, timestamp)),
        };

        let payload_bytes = &bytes[HEADER_LEN..HEADER_LEN + declared];
        let mut payload = if payload_bytes.is_empty() {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(payload_bytes)
                .map_err(|e| ProtocolError::Deserialization(e.to_string()))?
            {
                Value::Object(m) => m,
                other => {
                    return Err(ProtocolError::Deserialization(format!(
                        "payload must be a JSON object, got {other}"
                    )))
                }
            }
        };

        // A payload-carried id wins; otherwise assign one so every
        // decoded message is addressable.
        let id = match payload.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => Uuid::new_v4().to_string(),
        };

        Ok(WireMessage {
            msg_type,
            id,
            timestamp,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_ping_roundtrip() {
        let msg = WireMessage::with_parts(MessageType::Ping, "x", 1000, Map::new());
        let frame = BinaryCodec.encode(&msg).unwrap();
        let back = BinaryCodec.decode(&frame).unwrap();
        assert_eq!(back.msg_type, MessageType::Ping);
        assert_eq!(back.timestamp, 1000);
        assert_eq!(back.id, "x");
        assert!(back.payload.is_empty());
    }

    #[test]
    fn test_roundtrip_with_payload() {
        let msg = WireMessage::with_parts(
            MessageType::Delta,
            "op-9",
            1_700_000_000_123,
            payload(&[
                ("blockId", json!("b1")),
                ("kind", json!("insert")),
                ("position", json!(6)),
                ("text", json!("there ")),
            ]),
        );
        let frame = BinaryCodec.encode(&msg).unwrap();
        assert!(frame.is_binary());
        assert_eq!(BinaryCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_header_layout() {
        let msg = WireMessage::with_parts(MessageType::Delta, "x", 0x0102_0304, Map::new());
        let WireFrame::Binary(bytes) = BinaryCodec.encode(&msg).unwrap() else {
            panic!("expected binary frame")
        };
        assert_eq!(bytes[0], 0x20);
        // Big-endian i64 timestamp
        assert_eq!(&bytes[1..9], &[0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04]);
        // Declared length matches the trailing payload
        let declared = u32::from_be_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]) as usize;
        assert_eq!(declared, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn test_negative_timestamp_roundtrip() {
        let msg = WireMessage::with_parts(MessageType::Pong, "x", -1, Map::new());
        let back = BinaryCodec.decode(&BinaryCodec.encode(&msg).unwrap()).unwrap();
        assert_eq!(back.timestamp, -1);
    }

    #[test]
    fn test_rejects_text_frame() {
        let err = BinaryCodec
            .decode(&WireFrame::Text("{}".into()))
            .unwrap_err();
        assert_eq!(err, ProtocolError::InputKind { codec: "binary" });
    }

    #[test]
    fn test_short_buffer_is_hard_error() {
        for len in 0..HEADER_LEN {
            let err = BinaryCodec
                .decode(&WireFrame::Binary(vec![0u8; len]))
                .unwrap_err();
            assert_eq!(err, ProtocolError::Truncated { len });
        }
    }

    #[test]
    fn test_declared_length_overrun_is_hard_error() {
        let msg = WireMessage::with_parts(MessageType::Ack, "a", 1, Map::new());
        let WireFrame::Binary(mut bytes) = BinaryCodec.encode(&msg).unwrap() else {
            panic!("expected binary frame")
        };
        // Inflate the declared length past the actual payload.
        let bogus = (bytes.len() as u32).to_be_bytes();
        bytes[9..13].copy_from_slice(&bogus);
        let err = BinaryCodec.decode(&WireFrame::Binary(bytes.clone())).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::LengthMismatch {
                declared: bytes.len(),
                available: bytes.len() - HEADER_LEN,
            }
        );
    }

    #[test]
    fn test_unknown_type_code_degrades_to_error_message() {
        let mut bytes = vec![0x42];
        bytes.extend_from_slice(&1000i64.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let msg = BinaryCodec.decode(&WireFrame::Binary(bytes)).unwrap();
        assert_eq!(msg.msg_type, MessageType::Error);
        assert_eq!(msg.timestamp, 1000);
        assert!(!msg.id.is_empty());
        assert_eq!(msg.payload.get("code"), Some(&json!(0x42)));
        let diag = msg.payload.get("message").and_then(|v| v.as_str()).unwrap();
        assert!(diag.contains("0x42"));
    }

    #[test]
    fn test_decoded_id_always_present() {
        // Foreign frame whose payload has no id field.
        let body = br#"{"channel":"doc-1"}"#;
        let mut bytes = vec![MessageType::Subscribe.code()];
        bytes.extend_from_slice(&7i64.to_be_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(body);
        let msg = BinaryCodec.decode(&WireFrame::Binary(bytes)).unwrap();
        assert!(!msg.id.is_empty());
        assert_eq!(msg.payload.get("channel"), Some(&json!("doc-1")));
    }

    #[test]
    fn test_trailing_bytes_beyond_declared_ignored() {
        let msg = WireMessage::with_parts(MessageType::Ping, "x", 1, Map::new());
        let WireFrame::Binary(mut bytes) = BinaryCodec.encode(&msg).unwrap() else {
            panic!("expected binary frame")
        };
        bytes.extend_from_slice(b"junk");
        let back = BinaryCodec.decode(&WireFrame::Binary(bytes)).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(BinaryCodec.name(), "binary");
    }
}
