//! The message envelope: the unit exchanged between a panel and its host.
//!
//! Wire format (one JSON object per message):
//!
//! ```json
//! {"type":"artifactuse","action":"form:submit","data":{"x":1},"requestId":"r1","timestamp":1700000000000}
//! ```
//!
//! The `type` field is a fixed discriminator.  The channel a panel listens on
//! is usually shared with unrelated traffic (browser extensions, dev tools,
//! other libraries), so anything without this tag is simply not ours.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Fixed discriminator carried in the `type` field of every protocol envelope.
pub const PROTOCOL_TAG: &str = "artifactuse";

/// Reserved action used for replies correlated by `requestId`.
pub const RESPONSE_ACTION: &str = "response";

/// Action emitted once by a panel when it is ready to receive commands.
pub const READY_ACTION: &str = "panel:ready";

/// Correlation token linking a request envelope to its response envelope.
pub type RequestId = String;

/// One protocol message.
///
/// `data` is opaque to the bridge: its shape is owned by whichever action the
/// envelope carries (see [`crate::protocol::actions`] for the typed schemas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Protocol discriminator; always [`PROTOCOL_TAG`] for envelopes we build.
    #[serde(rename = "type")]
    pub kind: String,

    /// Semantic event or command name, used as the dispatch key.
    pub action: String,

    /// Action-defined payload.  Absent on the wire decodes as `null`.
    #[serde(default)]
    pub data: Value,

    /// Present when the sender expects an asynchronous reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,

    /// Emission time in Unix milliseconds.  Informational only: no ordering is
    /// derived from it.  Inbound values that are not a non-negative number
    /// read as `0` instead of rejecting the envelope.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: u64,
}

impl Envelope {
    /// Builds a protocol envelope stamped with the current time.
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            kind: PROTOCOL_TAG.to_string(),
            action: action.into(),
            data,
            request_id: None,
            timestamp: now_millis(),
        }
    }

    /// Attaches a correlation token.
    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Builds a `"response"` envelope carrying `payload`.
    pub fn response(payload: &ResponsePayload) -> Self {
        // Serializing a struct of strings, bools and `Value`s cannot fail.
        let data = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(RESPONSE_ACTION, data)
    }

    /// `true` when the envelope carries the protocol discriminator.
    pub fn is_protocol(&self) -> bool {
        self.kind == PROTOCOL_TAG
    }

    /// `true` for envelopes using the reserved response action.
    pub fn is_response(&self) -> bool {
        self.action == RESPONSE_ACTION
    }

    /// Decodes `data` as a [`ResponsePayload`] if this is a response envelope.
    pub fn response_payload(&self) -> Option<ResponsePayload> {
        if !self.is_response() {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Reads any JSON value as a millisecond timestamp.  Fractions are
/// truncated; negatives, non-numbers and `null` become `0`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .unwrap_or(0),
        _ => 0,
    })
}

/// Payload of a `"response"` envelope.
///
/// ```json
/// {"requestId":"r1","data":{"ok":true},"success":true}
/// {"requestId":"r2","error":"boom","success":false}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// The id of the request being answered.
    pub request_id: RequestId,

    /// Result value on success.  Omitted when the handler produced nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Success tag.
    pub success: bool,
}

impl ResponsePayload {
    /// A success-tagged response.
    pub fn success(request_id: impl Into<RequestId>, data: Option<Value>) -> Self {
        Self {
            request_id: request_id.into(),
            data,
            error: None,
            success: true,
        }
    }

    /// An error-tagged response.
    pub fn failure(request_id: impl Into<RequestId>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            data: None,
            error: Some(error.into()),
            success: false,
        }
    }

    /// Converts the tagged payload into a `Result`.
    ///
    /// A failure without a message becomes `"unknown error"`.
    pub fn into_result(self) -> Result<Option<Value>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

/// Current wall-clock time in Unix milliseconds.
///
/// Falls back to 0 if the system clock is set before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_envelope_carries_protocol_tag() {
        // Arrange / Act
        let env = Envelope::new("form:submit", json!({"x": 1}));

        // Assert
        assert_eq!(env.kind, PROTOCOL_TAG);
        assert!(env.is_protocol());
        assert!(env.request_id.is_none());
        assert!(env.timestamp > 0);
    }

    #[test]
    fn test_envelope_serializes_with_camel_case_request_id() {
        let env = Envelope::new("ai:request", json!({})).with_request_id("r1");

        let value = serde_json::to_value(&env).unwrap();

        assert_eq!(value["type"], "artifactuse");
        assert_eq!(value["requestId"], "r1");
        assert!(value.get("request_id").is_none());
    }

    #[test]
    fn test_envelope_without_request_id_omits_the_field() {
        let env = Envelope::new("panel:ready", json!({}));
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("requestId").is_none());
    }

    #[test]
    fn test_envelope_missing_data_decodes_as_null() {
        let env: Envelope =
            serde_json::from_value(json!({"type": "artifactuse", "action": "ping"})).unwrap();
        assert_eq!(env.data, Value::Null);
        assert_eq!(env.timestamp, 0);
    }

    #[test]
    fn test_odd_timestamps_decode_without_rejecting_the_envelope() {
        // Arrange
        let cases = [
            (json!(1_700_000_000_000_u64), 1_700_000_000_000),
            (json!(1_700_000_000_000.5), 1_700_000_000_000),
            (json!(1.5), 1),
            (json!(-1), 0),
            (Value::Null, 0),
            (json!("now"), 0),
        ];

        for (timestamp, expected) in cases {
            // Act
            let env: Envelope = serde_json::from_value(json!({
                "type": "artifactuse",
                "action": "ping",
                "timestamp": timestamp,
            }))
            .unwrap();

            // Assert
            assert_eq!(env.timestamp, expected, "timestamp {timestamp}");
        }
    }

    #[test]
    fn test_success_response_omits_error() {
        let payload = ResponsePayload::success("r1", Some(json!({"ok": true})));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"requestId": "r1", "data": {"ok": true}, "success": true}));
    }

    #[test]
    fn test_failure_response_omits_data() {
        let payload = ResponsePayload::failure("r2", "boom");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"requestId": "r2", "error": "boom", "success": false}));
    }

    #[test]
    fn test_response_envelope_exposes_its_payload() {
        // Arrange
        let payload = ResponsePayload::success("r1", Some(json!(42)));

        // Act
        let env = Envelope::response(&payload);

        // Assert
        assert!(env.is_response());
        assert_eq!(env.response_payload(), Some(payload));
    }

    #[test]
    fn test_response_payload_of_non_response_envelope_is_none() {
        let env = Envelope::new("form:submit", json!({"requestId": "r1", "success": true}));
        assert!(env.response_payload().is_none());
    }

    #[test]
    fn test_failure_without_message_maps_to_unknown_error() {
        let payload = ResponsePayload {
            request_id: "r3".to_string(),
            data: None,
            error: None,
            success: false,
        };
        assert_eq!(payload.into_result(), Err("unknown error".to_string()));
    }
}
