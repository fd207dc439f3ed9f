//! Wire protocol definitions for the bosun console realtime link.
//! Keeping this in a dedicated crate allows regeneration of bindings
//! for TypeScript/Go/etc. without pulling in heavier runtime code.
//!
//! Everything on the socket is a JSON text frame. Client→server frames are
//! either a channel control (`action` + `channel`) or a call
//! (`type` + `requestId` + `payload`); server→client frames are either a
//! channel push (`type` + `channel` + `payload`) or a call reply keyed by
//! `requestId`. Note that `type` on a push is a payload tag and `channel` is
//! the routing key; the two are never interchangeable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Subscribe,
    Unsubscribe,
}

/// Frames the client writes to the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClientFrame {
    /// Channel membership control: `{"action":"subscribe","channel":"network"}`.
    Control {
        action: ControlAction,
        channel: String,
    },
    /// One-shot request: `{"type":"ListContainers","requestId":"...","payload":{}}`.
    Call {
        #[serde(rename = "type")]
        ty: String,
        #[serde(rename = "requestId")]
        request_id: String,
        payload: Value,
    },
}

/// Frames the server writes to the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerFrame {
    /// Channel broadcast, delivered to every subscriber of `channel`.
    Push {
        #[serde(rename = "type")]
        ty: String,
        channel: String,
        #[serde(default)]
        payload: Value,
    },
    /// Reply to a call, correlated by `requestId`. Exactly one of `data`
    /// and `error` is normally present.
    Reply {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ClientFrame {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        ClientFrame::Control {
            action: ControlAction::Subscribe,
            channel: channel.into(),
        }
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        ClientFrame::Control {
            action: ControlAction::Unsubscribe,
            channel: channel.into(),
        }
    }
}

pub fn encode(frame: &ClientFrame) -> Result<String, ProtoError> {
    serde_json::to_string(frame).map_err(ProtoError::Encode)
}

pub fn decode(text: &str) -> Result<ServerFrame, ProtoError> {
    serde_json::from_str(text).map_err(ProtoError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_frames_match_wire_format() {
        let subscribe = encode(&ClientFrame::subscribe("network")).unwrap();
        assert_eq!(subscribe, r#"{"action":"subscribe","channel":"network"}"#);

        let unsubscribe = encode(&ClientFrame::unsubscribe("docker")).unwrap();
        assert_eq!(unsubscribe, r#"{"action":"unsubscribe","channel":"docker"}"#);
    }

    #[test]
    fn call_frame_matches_wire_format() {
        let frame = ClientFrame::Call {
            ty: "ListContainers".into(),
            request_id: "req-1".into(),
            payload: json!({"all": true}),
        };
        let text = encode(&frame).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "ListContainers");
        assert_eq!(value["requestId"], "req-1");
        assert_eq!(value["payload"]["all"], true);
    }

    #[test]
    fn decodes_push_frame() {
        let frame =
            decode(r#"{"type":"metrics","channel":"dashboard","payload":{"cpu":12.5}}"#).unwrap();
        match frame {
            ServerFrame::Push { ty, channel, payload } => {
                assert_eq!(ty, "metrics");
                assert_eq!(channel, "dashboard");
                assert_eq!(payload["cpu"], 12.5);
            }
            other => panic!("expected push, got {other:?}"),
        }
    }

    #[test]
    fn decodes_reply_with_data_or_error() {
        let ok = decode(r#"{"requestId":"req-1","data":[1,2,3]}"#).unwrap();
        assert_eq!(
            ok,
            ServerFrame::Reply {
                request_id: "req-1".into(),
                data: Some(json!([1, 2, 3])),
                error: None,
            }
        );

        let err = decode(r#"{"requestId":"req-2","error":"docker daemon unreachable"}"#).unwrap();
        match err {
            ServerFrame::Reply { request_id, data, error } => {
                assert_eq!(request_id, "req-2");
                assert!(data.is_none());
                assert_eq!(error.as_deref(), Some("docker daemon unreachable"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn push_without_payload_defaults_to_null() {
        let frame = decode(r#"{"type":"tick","channel":"dashboard"}"#).unwrap();
        match frame {
            ServerFrame::Push { payload, .. } => assert!(payload.is_null()),
            other => panic!("expected push, got {other:?}"),
        }
    }

    #[test]
    fn malformed_text_is_a_decode_error() {
        assert!(matches!(decode("not json"), Err(ProtoError::Decode(_))));
        assert!(matches!(decode(r#"{"unrelated":1}"#), Err(ProtoError::Decode(_))));
    }
}
