//! Typed payload schemas for the known actions.
//!
//! The bridge itself dispatches on an opaque `serde_json::Value`.  The types
//! in this module give both ends a checked view of the payloads: a host
//! decodes panel events with [`PanelEvent::from_envelope`], and a panel
//! decodes host commands with [`HostCommand::parse`].  Validation happens once,
//! at the boundary, and everything past it works with Rust types.
//!
//! # Serde representation
//!
//! Both enums are *adjacently tagged* on `action` / `data`, which is exactly
//! the pair of fields an [`Envelope`] carries:
//!
//! ```json
//! {"action":"form:submit","data":{"formId":"f1","action":"submit","values":{},"timestamp":1}}
//! {"action":"setCode","data":{"code":"<App />"}}
//! ```
//!
//! # Why separate panel→host and host→panel types?
//!
//! The two directions carry different information.  Using two enums makes it
//! a compile-time error to emit a host command from the panel side.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol::envelope::{Envelope, RequestId, ResponsePayload};

/// A payload failed its action's schema.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    /// The action is not one this schema set knows about.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The action is known but its `data` does not match the schema.
    #[error("invalid payload for '{action}': {reason}")]
    Invalid { action: String, reason: String },
}

/// Decodes the `data` of an envelope into `T`.
///
/// # Errors
///
/// Returns [`PayloadError::Invalid`] naming `action` when `data` does not
/// match `T`.
pub fn decode_payload<T: DeserializeOwned>(action: &str, data: &Value) -> Result<T, PayloadError> {
    serde_json::from_value(data.clone()).map_err(|e| PayloadError::Invalid {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

// ── Panel → Host events ───────────────────────────────────────────────────────

/// `panel:ready` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub timestamp: u64,
}

/// `ai:request` payload.  The request id is repeated inside the payload so
/// hosts that only look at `data` can still correlate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequestPayload {
    pub request_id: RequestId,
    pub prompt: String,
    #[serde(default)]
    pub context: Value,
}

/// `export:complete` payload describing the exported blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCompletePayload {
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type of the exported blob.
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// `form:submit` / `form:cancel` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPayload {
    pub form_id: String,
    /// The form action that was triggered; `"cancel"` for cancellations.
    pub action: String,
    #[serde(default)]
    pub values: Value,
    pub timestamp: u64,
}

/// `form:step` payload for multi-step (wizard) forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStepPayload {
    pub form_id: String,
    pub step: u32,
    #[serde(default)]
    pub values: Value,
    pub timestamp: u64,
}

/// Every event a panel can emit towards its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum PanelEvent {
    #[serde(rename = "panel:ready")]
    Ready(ReadyPayload),
    #[serde(rename = "ai:request")]
    AiRequest(AiRequestPayload),
    /// Persist the artifact; the payload is panel-defined.
    #[serde(rename = "save:request")]
    SaveRequest(Value),
    #[serde(rename = "export:complete")]
    ExportComplete(ExportCompletePayload),
    /// Push updated artifact data; the payload is panel-defined.
    #[serde(rename = "artifact:update")]
    ArtifactUpdate(Value),
    #[serde(rename = "form:submit")]
    FormSubmit(FormPayload),
    #[serde(rename = "form:cancel")]
    FormCancel(FormPayload),
    #[serde(rename = "form:step")]
    FormStep(FormStepPayload),
    #[serde(rename = "response")]
    Response(ResponsePayload),
}

impl PanelEvent {
    /// Wire action names, in declaration order.
    pub const ACTIONS: [&'static str; 9] = [
        "panel:ready",
        "ai:request",
        "save:request",
        "export:complete",
        "artifact:update",
        "form:submit",
        "form:cancel",
        "form:step",
        "response",
    ];

    /// The wire action name of this event.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Ready(_) => "panel:ready",
            Self::AiRequest(_) => "ai:request",
            Self::SaveRequest(_) => "save:request",
            Self::ExportComplete(_) => "export:complete",
            Self::ArtifactUpdate(_) => "artifact:update",
            Self::FormSubmit(_) => "form:submit",
            Self::FormCancel(_) => "form:cancel",
            Self::FormStep(_) => "form:step",
            Self::Response(_) => "response",
        }
    }

    /// Splits the event into its `(action, data)` pair.
    pub fn into_parts(self) -> (&'static str, Value) {
        let action = self.action();
        let data = serde_json::to_value(&self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(Value::take))
            .unwrap_or(Value::Null);
        (action, data)
    }

    /// Decodes a received envelope into a typed event.
    ///
    /// # Errors
    ///
    /// [`PayloadError::UnknownAction`] for actions outside [`Self::ACTIONS`],
    /// [`PayloadError::Invalid`] when the payload does not match.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, PayloadError> {
        parse_tagged(&Self::ACTIONS, &envelope.action, &envelope.data)?
            .ok_or_else(|| PayloadError::UnknownAction(envelope.action.clone()))
    }
}

// ── Host → Panel commands ─────────────────────────────────────────────────────

/// Colour scheme pushed by `theme:change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

/// Commands a host sends to a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum HostCommand {
    /// Replace the panel's source code (React / Vue previews).
    #[serde(rename = "setCode")]
    SetCode { code: String },

    /// Replace the panel's content (JSON, SVG, diff, HTML, form panels).
    #[serde(rename = "setContent")]
    SetContent { content: String },

    /// Switch colour scheme, optionally with explicit colour overrides.
    #[serde(rename = "theme:change")]
    ThemeChange {
        theme: Theme,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        colors: Option<Value>,
    },
}

impl HostCommand {
    /// Wire action names, in declaration order.
    pub const ACTIONS: [&'static str; 3] = ["setCode", "setContent", "theme:change"];

    /// Decodes a host command.
    ///
    /// Returns `Ok(None)` for actions that are not host commands, so callers
    /// can fall through to their own handling.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Invalid`] when `action` is a known command but
    /// `data` does not match its schema.
    ///
    /// # Example
    ///
    /// ```rust
    /// use panel_core::protocol::HostCommand;
    /// use serde_json::json;
    ///
    /// let cmd = HostCommand::parse("setCode", &json!({"code": "<App />"})).unwrap();
    /// assert_eq!(cmd, Some(HostCommand::SetCode { code: "<App />".into() }));
    /// assert_eq!(HostCommand::parse("ping", &json!({})).unwrap(), None);
    /// ```
    pub fn parse(action: &str, data: &Value) -> Result<Option<Self>, PayloadError> {
        parse_tagged(&Self::ACTIONS, action, data)
    }

    /// The text this command asks the panel to display, if any.
    pub fn source_text(&self) -> Option<&str> {
        match self {
            Self::SetCode { code } => Some(code),
            Self::SetContent { content } => Some(content),
            Self::ThemeChange { .. } => None,
        }
    }
}

/// Shared decoding for the adjacently tagged enums above.
fn parse_tagged<T: DeserializeOwned>(
    known: &[&str],
    action: &str,
    data: &Value,
) -> Result<Option<T>, PayloadError> {
    if !known.contains(&action) {
        return Ok(None);
    }
    decode_payload(action, &json!({ "action": action, "data": data })).map(Some)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
