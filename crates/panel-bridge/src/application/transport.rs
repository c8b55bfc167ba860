//! The transport capability the bridge is built on.
//!
//! The bridge never touches a concrete channel.  It is handed a [`Transport`]
//! at construction time and uses exactly two operations:
//!
//! - [`Transport::post_message`] – hand an envelope to the channel, addressed
//!   to a target origin.
//! - [`Transport::on_message`] – subscribe to raw inbound traffic.  The
//!   returned [`ChannelSubscription`] removes the subscription when cancelled
//!   or dropped.
//!
//! Infrastructure provides an in-memory channel (tests, embedding) and a
//! WebSocket channel; anything else that can carry JSON with a verified
//! sender identity can be plugged in.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use panel_core::{Envelope, Origin};
use serde_json::Value;
use thiserror::Error;

/// One raw message as delivered by the channel.
///
/// `data` is unvalidated: it may not be an envelope at all.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Verified identity of the sender, as attested by the channel (for
    /// example the `Origin` of a WebSocket handshake).
    pub source: String,
    /// The raw payload.
    pub data: Value,
}

impl InboundMessage {
    pub fn new(source: impl Into<String>, data: Value) -> Self {
        Self {
            source: source.into(),
            data,
        }
    }
}

/// Errors a transport can report from [`Transport::post_message`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// There is no counterpart to send to (standalone panel, detached host).
    #[error("no remote endpoint attached")]
    NoRemote,

    /// The channel was closed.
    #[error("channel closed")]
    Closed,

    /// The envelope could not be handed to the channel.
    #[error("send failed: {0}")]
    Send(String),
}

/// Callback invoked once per raw inbound message.
pub type InboundHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

/// A duplex channel with sender-identity metadata.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Hands `envelope` to the channel, addressed to `target`.
    ///
    /// A transport that knows the remote's identity must not deliver to a
    /// remote that does not match an exact `target`.
    fn post_message(&self, envelope: &Envelope, target: &Origin) -> Result<(), TransportError>;

    /// Subscribes `handler` to inbound traffic.
    fn on_message(&self, handler: InboundHandler) -> ChannelSubscription;
}

/// Handle to an inbound subscription.  Cancelling (or dropping) it
/// unsubscribes.
pub struct ChannelSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ChannelSubscription {
    /// Wraps the action that removes the subscription.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to remove.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Removes the subscription now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The inbound handler list a transport implementation keeps.
///
/// Delivery clones the list first, so a handler may subscribe or cancel
/// while it is being called.
#[derive(Default)]
pub struct Subscribers {
    handlers: Mutex<Vec<(u64, InboundHandler)>>,
    next_id: AtomicU64,
}

impl Subscribers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds `handler`.  The returned subscription removes it again.
    pub fn subscribe(self: &Arc<Self>, handler: InboundHandler) -> ChannelSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().push((id, handler));

        let weak = Arc::downgrade(self);
        ChannelSubscription::new(move || {
            if let Some(subscribers) = weak.upgrade() {
                subscribers.lock().retain(|(hid, _)| *hid != id);
            }
        })
    }

    /// Calls every current handler with `message`.
    pub fn deliver(&self, message: InboundMessage) {
        let handlers: Vec<InboundHandler> =
            self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(message.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, InboundHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

/// Transport for a panel with no counterpart, e.g. opened directly in a
/// browser tab during development.  Every send reports
/// [`TransportError::NoRemote`] and nothing is ever received.
#[derive(Debug, Default, Clone, Copy)]
pub struct Standalone;

impl Transport for Standalone {
    fn post_message(&self, _envelope: &Envelope, _target: &Origin) -> Result<(), TransportError> {
        Err(TransportError::NoRemote)
    }

    fn on_message(&self, _handler: InboundHandler) -> ChannelSubscription {
        ChannelSubscription::noop()
    }
}
