//! Listener interface and registry.
//!
//! A listener is a callback registered for one action.  It receives the
//! envelope's `data` and `requestId` and tells the bridge, explicitly, how its
//! result should be delivered:
//!
//! ```text
//! Ok(ListenerResult::Immediate(None))     nothing to reply
//! Ok(ListenerResult::Immediate(Some(v)))  reply now with v (if a requestId was sent)
//! Ok(ListenerResult::Deferred(future))    reply when the future settles
//! Err(ListenerError)                      reply with an error (if a requestId was sent)
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use panel_core::PayloadError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ── Listener results ──────────────────────────────────────────────────────────

/// Failure raised by a listener.  Its message becomes the `error` field of the
/// response envelope.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts a caught panic payload into an error.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "listener panicked".to_string()
        };
        Self { message }
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<PayloadError> for ListenerError {
    fn from(e: PayloadError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for ListenerError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<anyhow::Error> for ListenerError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(format!("{e:#}"))
    }
}

/// Future produced by a deferred listener.
pub type DeferredResult = BoxFuture<'static, Result<Option<Value>, ListenerError>>;

/// How a listener's result is delivered.
pub enum ListenerResult {
    /// The result is available now.  `None` means "nothing to reply".
    Immediate(Option<Value>),
    /// The result completes later.  The bridge awaits it out of band.
    Deferred(DeferredResult),
}

impl ListenerResult {
    /// Nothing to reply.
    pub fn none() -> Self {
        Self::Immediate(None)
    }

    /// Reply now with `value`.
    pub fn value(value: Value) -> Self {
        Self::Immediate(Some(value))
    }

    /// Reply now with any serializable value.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] if `value` cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ListenerError> {
        Ok(Self::Immediate(to_reply(value)?))
    }

    /// Reply when `future` settles.
    pub fn deferred<F, T>(future: F) -> Self
    where
        F: Future<Output = Result<T, ListenerError>> + Send + 'static,
        T: Serialize + 'static,
    {
        Self::Deferred(future.map(|r| r.and_then(|v| to_reply(&v))).boxed())
    }
}

impl fmt::Debug for ListenerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(v) => f.debug_tuple("Immediate").field(v).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// `null` means "no value", matching an absent reply.
fn to_reply<T: Serialize>(value: &T) -> Result<Option<Value>, ListenerError> {
    let v = serde_json::to_value(value)?;
    Ok((!v.is_null()).then_some(v))
}

// ── Listener registry ─────────────────────────────────────────────────────────

/// A registered callback: `(data, requestId) -> result`.
pub type Listener =
    Arc<dyn Fn(&Value, Option<&str>) -> Result<ListenerResult, ListenerError> + Send + Sync>;

/// Identifies one registration, for [`ListenerRegistry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Action name → listeners, in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    by_action: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under `action`.
    pub fn insert(&mut self, action: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_action
            .entry(action.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Removes one registration.  Returns `false` if it was not registered.
    pub fn remove(&mut self, action: &str, id: ListenerId) -> bool {
        let Some(list) = self.by_action.get_mut(action) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_action.remove(action);
        }
        removed
    }

    /// Listeners for `action`, cloned so the registry can be unlocked before
    /// any of them runs.
    pub fn snapshot(&self, action: &str) -> Vec<Listener> {
        self.by_action
            .get(action)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, action: &str) -> usize {
        self.by_action.get(action).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_action.clear();
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .by_action
            .iter()
            .map(|(a, l)| (a.as_str(), l.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
