//! Application layer for panel-bridge.
//!
//! The application layer holds the bridge itself: it knows *what* to do with
//! a message, but relies on an injected [`Transport`] for *how* messages move.
//!
//! # Responsibilities
//!
//! - Gating inbound traffic by origin and protocol tag
//! - Dispatching envelopes to registered listeners
//! - Turning listener results into response envelopes
//! - The ready signal and teardown
//! - Caller-side response correlation ([`PendingRequests`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Envelope and payload schemas (those live in `panel-core`)

pub mod bridge;
pub mod listener;
pub mod pending;
pub mod session;
pub mod transport;

// Re-export so callers can write `application::Bridge`.
pub use bridge::{Bridge, Subscription};
pub use listener::{DeferredResult, Listener, ListenerError, ListenerId, ListenerResult};
pub use pending::{CorrelationError, PendingRequests, PendingResponse};
pub use session::{PanelSession, PanelState};
pub use transport::{
    ChannelSubscription, InboundHandler, InboundMessage, Standalone, Subscribers, Transport,
    TransportError,
};
