//! Caller-side request/response correlation.
//!
//! The bridge sends requests and answers them, but it never remembers a
//! request *it* initiated: a response arriving for one is dispatched like any
//! other action.  Callers that want to `await` an answer keep their own table,
//! and [`PendingRequests`] is that table.
//!
//! # For beginners: how does correlation work?
//!
//! ```text
//! caller                     PendingRequests                remote
//!   │ register("ai-1-…")  ──►  id → oneshot::Sender
//!   │ send request with id ─────────────────────────────────►
//!   │ wait().await                                          │
//!   │                          resolve(response) ◄──────────┘
//!   │ ◄── Ok(data) / Err(error)
//! ```
//!
//! A waiter that is dropped (for example because the caller gave up after a
//! timeout) removes its own entry, so a late response is simply ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use panel_core::{Envelope, RequestId, ResponsePayload};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Why a correlated request produced no data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CorrelationError {
    /// A waiter for this id is already registered.
    #[error("request id {0} is already pending")]
    Duplicate(RequestId),

    /// The table was dropped before a response arrived.
    #[error("request {0} was abandoned before a response arrived")]
    Dropped(RequestId),

    /// No response arrived within the caller's deadline.
    #[error("request {id} timed out after {after:?}")]
    TimedOut { id: RequestId, after: Duration },

    /// The remote answered with `success: false`.
    #[error("remote error: {0}")]
    Remote(String),
}

type Waiters = HashMap<RequestId, oneshot::Sender<ResponsePayload>>;

/// Table of requests awaiting a response.  Clones share the table.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    waiters: Arc<Mutex<Waiters>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in the response to `id`.
    ///
    /// # Errors
    ///
    /// [`CorrelationError::Duplicate`] if `id` is already pending.
    pub fn register(&self, id: impl Into<RequestId>) -> Result<PendingResponse, CorrelationError> {
        let id = id.into();
        let mut waiters = lock(&self.waiters);
        if waiters.contains_key(&id) {
            return Err(CorrelationError::Duplicate(id));
        }
        let (tx, rx) = oneshot::channel();
        waiters.insert(id.clone(), tx);
        Ok(PendingResponse {
            id,
            rx,
            table: Arc::downgrade(&self.waiters),
        })
    }

    /// Completes the waiter for `payload.request_id`.
    ///
    /// Returns `false` for ids nobody is waiting for.
    pub fn resolve(&self, payload: ResponsePayload) -> bool {
        let waiter = lock(&self.waiters).remove(&payload.request_id);
        match waiter {
            Some(tx) => tx.send(payload).is_ok(),
            None => {
                debug!(request_id = %payload.request_id, "response for unknown request ignored");
                false
            }
        }
    }

    /// [`resolve`](Self::resolve) for a full envelope.  Envelopes that are not
    /// well-formed responses are ignored.
    pub fn resolve_envelope(&self, envelope: &Envelope) -> bool {
        envelope
            .response_payload()
            .is_some_and(|payload| self.resolve(payload))
    }

    /// Number of requests still waiting.
    pub fn len(&self) -> usize {
        lock(&self.waiters).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The caller's half of one pending request.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<ResponsePayload>,
    table: Weak<Mutex<Waiters>>,
}

impl PendingResponse {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the response.
    ///
    /// # Errors
    ///
    /// [`CorrelationError::Remote`] when the remote reported a failure,
    /// [`CorrelationError::Dropped`] when the table went away first.
    pub async fn wait(mut self) -> Result<Option<Value>, CorrelationError> {
        let outcome = (&mut self.rx).await;
        match outcome {
            Ok(payload) => payload.into_result().map_err(CorrelationError::Remote),
            Err(_) => Err(CorrelationError::Dropped(self.id.clone())),
        }
    }

    /// [`wait`](Self::wait) with a deadline.  On timeout the entry is removed.
    pub async fn wait_timeout(self, after: Duration) -> Result<Option<Value>, CorrelationError> {
        let id = self.id.clone();
        match tokio::time::timeout(after, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(CorrelationError::TimedOut { id, after }),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            lock(&table).remove(&self.id);
        }
    }
}

fn lock(waiters: &Mutex<Waiters>) -> MutexGuard<'_, Waiters> {
    waiters.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
