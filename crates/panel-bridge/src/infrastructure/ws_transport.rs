//! [`Transport`] over one WebSocket connection.
//!
//! The sender identity of every inbound frame is the `Origin` header the
//! remote presented during the HTTP upgrade handshake.  Browsers set that
//! header themselves and scripts cannot forge it, which makes it the
//! WebSocket equivalent of a `postMessage` event's `origin`.
//!
//! The transport itself does no I/O.  Outbound envelopes are encoded and
//! queued as text frames; the session task in `ws_server` owns the socket,
//! drains the queue into the sink and feeds received frames back through
//! [`WsTransport::deliver_text`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use panel_core::protocol::codec::parse_text;
use panel_core::{encode_envelope, Envelope, Origin};
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::transport::{
    ChannelSubscription, InboundHandler, InboundMessage, Subscribers, Transport, TransportError,
};

/// Capacity of the outbound frame queue.
pub const OUTBOUND_QUEUE: usize = 256;

/// Panel-side transport for one WebSocket peer.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct WsTransport {
    peer_origin: Arc<str>,
    out_tx: mpsc::Sender<String>,
    closed: Arc<AtomicBool>,
    subscribers: Arc<Subscribers>,
}

impl WsTransport {
    /// Creates a transport for a peer that presented `peer_origin`.
    ///
    /// Returns the transport and the receiving end of its outbound queue.
    pub fn new(peer_origin: impl Into<String>) -> (Self, mpsc::Receiver<String>) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let transport = Self {
            peer_origin: Arc::from(peer_origin.into()),
            out_tx,
            closed: Arc::new(AtomicBool::new(false)),
            subscribers: Subscribers::new(),
        };
        (transport, out_rx)
    }

    pub fn peer_origin(&self) -> &str {
        &self.peer_origin
    }

    /// Hands one received text frame to the subscribers.
    ///
    /// Frames that are not JSON are dropped here: they cannot be envelopes.
    pub fn deliver_text(&self, text: &str) {
        if self.is_closed() {
            return;
        }
        match parse_text(text) {
            Ok(data) => self
                .subscribers
                .deliver(InboundMessage::new(self.peer_origin.as_ref(), data)),
            Err(e) => debug!(peer = %self.peer_origin, "ignored non-JSON frame: {e}"),
        }
    }

    /// Marks the connection closed.  Further sends fail with
    /// [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for WsTransport {
    fn post_message(&self, envelope: &Envelope, target: &Origin) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if !target.allows(&self.peer_origin) {
            debug!(%target, peer = %self.peer_origin, "target mismatch; frame dropped");
            return Ok(());
        }

        let text = encode_envelope(envelope).map_err(|e| TransportError::Send(e.to_string()))?;
        self.out_tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Send("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn on_message(&self, handler: InboundHandler) -> ChannelSubscription {
        self.subscribers.subscribe(handler)
    }
}
