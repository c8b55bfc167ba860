//! JSON codec for protocol envelopes.
//!
//! Inbound traffic is *classified* rather than simply decoded, because the
//! channel a panel listens on is shared:
//!
//! ```text
//! raw value ──► not an object / no "type":"artifactuse" ──► Inbound::Foreign   (ignore)
//!           └─► tagged, but not a valid envelope         ──► Inbound::Malformed (ignore, log)
//!           └─► tagged and valid                         ──► Inbound::Protocol  (dispatch)
//! ```
//!
//! Neither `Foreign` nor `Malformed` is ever surfaced to the remote sender.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::envelope::{Envelope, PROTOCOL_TAG};

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// A text frame was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The value carried the protocol tag but its fields did not match the
    /// envelope shape (missing `action`, non-string `requestId`, ...).
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Result of classifying one raw inbound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed protocol envelope.
    Protocol(Envelope),
    /// Traffic that does not belong to this protocol.
    Foreign,
    /// Tagged as ours, but not decodable.
    Malformed(ProtocolError),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Classifies an already-parsed inbound value.
///
/// # Examples
///
/// ```rust
/// use panel_core::{classify_inbound, Inbound};
/// use serde_json::json;
///
/// let ours = json!({"type": "artifactuse", "action": "setCode", "data": {"code": "x"}});
/// assert!(matches!(classify_inbound(&ours), Inbound::Protocol(_)));
///
/// let theirs = json!({"source": "react-devtools"});
/// assert_eq!(classify_inbound(&theirs), Inbound::Foreign);
/// ```
pub fn classify_inbound(value: &Value) -> Inbound {
    let tagged = value
        .as_object()
        .and_then(|obj| obj.get("type"))
        .and_then(Value::as_str)
        == Some(PROTOCOL_TAG);

    if !tagged {
        return Inbound::Foreign;
    }

    match serde_json::from_value::<Envelope>(value.clone()) {
        Ok(envelope) => Inbound::Protocol(envelope),
        Err(e) => Inbound::Malformed(ProtocolError::MalformedEnvelope(e.to_string())),
    }
}

/// Classifies a raw text frame.
///
/// Text that is not JSON at all is foreign traffic, not an error: other
/// users of the channel are free to send plain strings.
pub fn classify_text(text: &str) -> Inbound {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify_inbound(&value),
        Err(_) => Inbound::Foreign,
    }
}

/// Parses a text frame into a JSON value.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidJson`] if `text` is not valid JSON.
pub fn parse_text(text: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Encodes an envelope as a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(|e| ProtocolError::Encode(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_envelope_is_protocol() {
        // Arrange
        let raw = json!({
            "type": "artifactuse",
            "action": "form:submit",
            "data": {"x": 1},
            "requestId": "r1",
            "timestamp": 1
        });

        // Act
        let result = classify_inbound(&raw);

        // Assert
        match result {
            Inbound::Protocol(env) => {
                assert_eq!(env.action, "form:submit");
                assert_eq!(env.data, json!({"x": 1}));
                assert_eq!(env.request_id.as_deref(), Some("r1"));
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
    }

    #[test]
    fn test_other_discriminator_is_foreign() {
        let raw = json!({"type": "webpackOk", "action": "x"});
        assert_eq!(classify_inbound(&raw), Inbound::Foreign);
    }

    #[test]
    fn test_missing_discriminator_is_foreign() {
        let raw = json!({"action": "form:submit", "data": {}});
        assert_eq!(classify_inbound(&raw), Inbound::Foreign);
    }

    #[test]
    fn test_non_object_values_are_foreign() {
        assert_eq!(classify_inbound(&Value::Null), Inbound::Foreign);
        assert_eq!(classify_inbound(&json!("artifactuse")), Inbound::Foreign);
        assert_eq!(classify_inbound(&json!([1, 2, 3])), Inbound::Foreign);
    }

    #[test]
    fn test_tagged_value_without_action_is_malformed() {
        let raw = json!({"type": "artifactuse", "data": {}});
        assert!(matches!(classify_inbound(&raw), Inbound::Malformed(_)));
    }

    #[test]
    fn test_tagged_value_with_numeric_request_id_is_malformed() {
        let raw = json!({"type": "artifactuse", "action": "a", "requestId": 7});
        assert!(matches!(classify_inbound(&raw), Inbound::Malformed(_)));
    }

    #[test]
    fn test_malformed_classification_can_be_cloned() {
        let raw = json!({"type": "artifactuse", "action": 42});
        let first = classify_inbound(&raw);

        let copy = first.clone();

        assert_eq!(copy, first);
        assert!(matches!(copy, Inbound::Malformed(ProtocolError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_tagged_value_with_fractional_timestamp_is_protocol() {
        let raw = json!({"type": "artifactuse", "action": "a", "timestamp": 1.5});
        assert!(matches!(classify_inbound(&raw), Inbound::Protocol(_)));
    }

    #[test]
    fn test_non_json_text_is_foreign() {
        assert_eq!(classify_text("hello there"), Inbound::Foreign);
    }

    #[test]
    fn test_parse_text_reports_invalid_json() {
        assert!(matches!(parse_text("{"), Err(ProtocolError::InvalidJson(_))));
    }

    #[test]
    fn test_encoded_envelope_classifies_back_to_itself() {
        let env = Envelope::new("artifact:update", json!({"k": "v"})).with_request_id("abc");
        let text = encode_envelope(&env).unwrap();
        assert_eq!(classify_text(&text), Inbound::Protocol(env));
    }
}
