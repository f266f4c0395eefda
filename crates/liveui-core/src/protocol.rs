//! LiveUI wire protocol.
//!
//! Every frame is one JSON object:
//! `{ "type": ..., "sessionId": ..., "data": ..., "timestamp": ... }`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Error code sent to a session's connections when the session is swept.
pub const SESSION_EXPIRED_CODE: &str = "session_expired";

/// Frame type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Client -> Server heartbeat.
    Ping,
    /// Server -> Client heartbeat reply.
    Pong,
    /// Client -> Server widget interaction.
    ComponentEvent,
    /// Server -> Client full content replace.
    UiUpdate,
    /// Server -> Client targeted node replace.
    PartialUpdate,
    /// Server -> Client error notice.
    Error,
    /// Server -> Client append of a new widget.
    AddWidget,
    #[serde(other)]
    Unknown,
}

/// A wire frame. Immutable once built; constructors stamp the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, alias = "session_id")]
    pub session_id: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Payload of a `component_event` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEvent {
    #[serde(default)]
    pub component_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
}

/// Browsers send numbers and booleans for some inputs; callbacks always see text.
fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Message {
    fn new(kind: MessageType, session_id: &str, data: Option<Value>) -> Self {
        Self {
            kind,
            session_id: session_id.to_string(),
            data,
            timestamp: now_millis(),
        }
    }

    pub fn ping(session_id: &str) -> Self {
        Self::new(MessageType::Ping, session_id, None)
    }

    pub fn pong(session_id: &str) -> Self {
        Self::new(MessageType::Pong, session_id, None)
    }

    pub fn ui_update(session_id: &str, html: &str) -> Self {
        Self::new(MessageType::UiUpdate, session_id, Some(json!({ "html": html })))
    }

    pub fn partial_update(session_id: &str, component_id: &str, html: &str) -> Self {
        Self::new(
            MessageType::PartialUpdate,
            session_id,
            Some(json!({ "componentId": component_id, "html": html })),
        )
    }

    pub fn add_widget(session_id: &str, component_id: &str, html: &str) -> Self {
        Self::new(
            MessageType::AddWidget,
            session_id,
            Some(json!({ "componentId": component_id, "html": html })),
        )
    }

    pub fn error(session_id: &str, message: &str, code: &str) -> Self {
        Self::new(
            MessageType::Error,
            session_id,
            Some(json!({ "message": message, "code": code })),
        )
    }

    pub fn component_event(session_id: &str, event: &ComponentEvent) -> Self {
        Self::new(
            MessageType::ComponentEvent,
            session_id,
            serde_json::to_value(event).ok(),
        )
    }

    /// Decode a frame from its JSON text.
    pub fn decode(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| crate::error::LiveUiError::Protocol(format!("invalid frame: {e}")))
    }

    /// Encode the frame as JSON text.
    pub fn encode(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Interpret `data` as a component event payload.
    ///
    /// A missing `data` object yields an empty event, mirroring how browsers
    /// that send bare events are treated.
    pub fn component_event_data(&self) -> crate::error::Result<ComponentEvent> {
        match &self.data {
            None | Some(Value::Null) => Ok(ComponentEvent::default()),
            Some(data) => serde_json::from_value(data.clone()).map_err(|e| {
                crate::error::LiveUiError::Protocol(format!("invalid component event: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_shape() {
        let msg = Message::partial_update("s1", "widget_1", "<div>hi</div>");
        let v: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "partial_update");
        assert_eq!(v["sessionId"], "s1");
        assert_eq!(v["data"]["componentId"], "widget_1");
        assert_eq!(v["data"]["html"], "<div>hi</div>");
        assert!(v["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_error_shape() {
        let msg = Message::error("s1", "gone", SESSION_EXPIRED_CODE);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["data"]["message"], "gone");
        assert_eq!(v["data"]["code"], "session_expired");
    }

    #[test]
    fn test_decode_component_event() {
        let raw = r#"{
            "type": "component_event",
            "sessionId": "abc",
            "data": {"componentId": "widget_7", "eventType": "click", "value": ""},
            "timestamp": 0
        }"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.kind, MessageType::ComponentEvent);
        let event = msg.component_event_data().unwrap();
        assert_eq!(event.component_id, "widget_7");
        assert_eq!(event.event_type, "click");
    }

    #[test]
    fn test_decode_accepts_snake_case_session_id() {
        let msg = Message::decode(r#"{"type":"ping","session_id":"abc"}"#).unwrap();
        assert_eq!(msg.kind, MessageType::Ping);
        assert_eq!(msg.session_id, "abc");
        assert_eq!(msg.timestamp, 0);
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let msg = Message::decode(
            r#"{"type":"component_event","data":{"componentId":"w","eventType":"change","value":42.5}}"#,
        )
        .unwrap();
        assert_eq!(msg.component_event_data().unwrap().value, "42.5");

        let msg = Message::decode(
            r#"{"type":"component_event","data":{"componentId":"w","eventType":"change","value":true}}"#,
        )
        .unwrap();
        assert_eq!(msg.component_event_data().unwrap().value, "true");
    }

    #[test]
    fn test_unknown_type_decodes() {
        let msg = Message::decode(r#"{"type":"telemetry","sessionId":"x"}"#).unwrap();
        assert_eq!(msg.kind, MessageType::Unknown);
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        let err = Message::decode("not json").unwrap_err();
        assert!(matches!(err, crate::error::LiveUiError::Protocol(_)));
    }
}
