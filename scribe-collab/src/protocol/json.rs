//! Human-debuggable text codec.
//!
//! Encodes a message as one flattened JSON object:
//! `{"type": ..., "id": ..., "timestamp": ..., <payload fields>}`.
//! No framing beyond the serialization itself; decode is
//! field-order independent.

use serde_json::Value;

use super::{ProtocolError, WireCodec, WireFrame, WireMessage};

/// The `"json"` protocol adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &WireMessage) -> Result<WireFrame, ProtocolError> {
        let mut map = message.payload.clone();
        // Envelope fields win over same-named payload entries.
        map.insert("type".into(), Value::String(message.msg_type.name().into()));
        map.insert("id".into(), Value::String(message.id.clone()));
        map.insert("timestamp".into(), Value::from(message.timestamp));

        let text = serde_json::to_string(&Value::Object(map))
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok(WireFrame::Text(text))
    }

    fn decode(&self, frame: &WireFrame) -> Result<WireMessage, ProtocolError> {
        let text = match frame {
            WireFrame::Text(t) => t,
            WireFrame::Binary(_) => {
                return Err(ProtocolError::InputKind { codec: self.name() })
            }
        };
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        WireMessage::from_value(value)
    }
}
