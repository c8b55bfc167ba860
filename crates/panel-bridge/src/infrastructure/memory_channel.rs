//! In-memory duplex channel.
//!
//! [`memory_channel`] returns two connected ends:
//!
//! ```text
//!   Bridge ── MemoryTransport ───────► outbox ──────► HostEndpoint::recv()
//!          ◄─ handlers (synchronous) ◄──────────────── HostEndpoint::post()
//! ```
//!
//! Host → panel delivery is synchronous: `post` returns after every
//! subscribed handler (and therefore every immediate listener) has run.
//! Panel → host traffic is queued on an unbounded channel.
//!
//! The host end behaves like a browser window: an envelope addressed to an
//! exact origin that is not the host's own is dropped without an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use panel_core::{Envelope, Origin, ProtocolError};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::application::pending::{CorrelationError, PendingRequests, PendingResponse};
use crate::application::transport::{
    ChannelSubscription, InboundHandler, InboundMessage, Subscribers, Transport, TransportError,
};

/// One message the panel posted, with the target it was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub envelope: Envelope,
    pub target: Origin,
}

/// Errors raised by the host end.
#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}

struct Shared {
    host_origin: String,
    subscribers: Arc<Subscribers>,
    outbox: mpsc::UnboundedSender<PostedMessage>,
    detached: AtomicBool,
    pending: PendingRequests,
}

/// Creates a connected transport / host pair.  `host_origin` is the
/// identity the host's messages arrive with.
pub fn memory_channel(host_origin: impl Into<String>) -> (MemoryTransport, HostEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        host_origin: host_origin.into(),
        subscribers: Subscribers::new(),
        outbox: tx,
        detached: AtomicBool::new(false),
        pending: PendingRequests::new(),
    });
    (
        MemoryTransport {
            shared: Arc::clone(&shared),
        },
        HostEndpoint { shared, rx },
    )
}

// ── Panel side ────────────────────────────────────────────────────────────────

/// The panel's end of a [`memory_channel`].
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl Transport for MemoryTransport {
    fn post_message(&self, envelope: &Envelope, target: &Origin) -> Result<(), TransportError> {
        if self.shared.detached.load(Ordering::SeqCst) {
            return Err(TransportError::NoRemote);
        }
        if !target.allows(&self.shared.host_origin) {
            debug!(%target, host = %self.shared.host_origin, "target mismatch; message dropped");
            return Ok(());
        }

        if envelope.is_response() {
            self.shared.pending.resolve_envelope(envelope);
        }

        self.shared
            .outbox
            .send(PostedMessage {
                envelope: envelope.clone(),
                target: target.clone(),
            })
            .map_err(|_| TransportError::Closed)
    }

    fn on_message(&self, handler: InboundHandler) -> ChannelSubscription {
        self.shared.subscribers.subscribe(handler)
    }
}

// ── Host side ─────────────────────────────────────────────────────────────────

/// The host's end of a [`memory_channel`].
pub struct HostEndpoint {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<PostedMessage>,
}

impl HostEndpoint {
    /// Delivers a raw value from the host's own origin.
    pub fn post(&self, data: Value) {
        let source = self.shared.host_origin.clone();
        self.post_from(&source, data);
    }

    /// Delivers a raw value as if it came from `source`.
    pub fn post_from(&self, source: &str, data: Value) {
        self.shared
            .subscribers
            .deliver(InboundMessage::new(source, data));
    }

    /// Delivers an envelope from the host's own origin.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Encode`] if the envelope cannot be serialized.
    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let value =
            serde_json::to_value(envelope).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        self.post(value);
        Ok(())
    }

    /// Sends a fire-and-forget command to the panel.
    pub fn send(&self, action: &str, data: Value) -> Result<(), ProtocolError> {
        self.send_envelope(&Envelope::new(action, data))
    }

    /// Sends a request and returns a waiter for the panel's response.
    ///
    /// The waiter is registered before the request is delivered, so a
    /// synchronous reply is not missed.
    pub fn request(&self, action: &str, data: Value) -> Result<PendingResponse, ChannelError> {
        let id = format!("host-{}", Uuid::new_v4().simple());
        let waiter = self.shared.pending.register(id.clone())?;
        self.send_envelope(&Envelope::new(action, data).with_request_id(id))?;
        Ok(waiter)
    }

    /// Waits for the next message the panel posts.
    pub async fn recv(&mut self) -> Option<PostedMessage> {
        self.rx.recv().await
    }

    /// Next message the panel posted, if one is already queued.
    pub fn try_recv(&mut self) -> Option<PostedMessage> {
        self.rx.try_recv().ok()
    }

    /// Drains everything queued so far.
    pub fn drain(&mut self) -> Vec<PostedMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Number of live panel-side subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Simulates the host going away: further panel sends report
    /// [`TransportError::NoRemote`].
    pub fn detach(&self) {
        self.shared.detached.store(true, Ordering::SeqCst);
    }

    pub fn host_origin(&self) -> &str {
        &self.shared.host_origin
    }
}
