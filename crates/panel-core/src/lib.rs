//! # panel-core
//!
//! Shared library for the Artifactuse preview panels containing the envelope
//! protocol, the per-action payload schemas, and the origin identity types.
//!
//! This crate is used by the panel-side bridge and by anything that speaks to
//! a panel from the host side.  It has zero dependencies on async runtimes,
//! sockets, or browser APIs.
//!
//! # Architecture overview (for beginners)
//!
//! A preview panel (JSON viewer, diff viewer, React preview, form, ...) runs
//! inside an isolated rendering context, typically an embedded frame.  It
//! cannot share memory with the host application that embeds it, so the two
//! sides talk by exchanging small JSON messages called *envelopes*.
//!
//! This crate (`panel-core`) is the shared vocabulary.  It defines:
//!
//! - **`protocol`** – What an envelope looks like on the wire, how raw
//!   inbound values are classified (ours / not ours / malformed), the typed
//!   payloads of every known action, and how request ids are generated.
//!
//! - **`domain`** – Origin identities: which remote endpoint a message came
//!   from, and which endpoint an outbound message is addressed to.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `panel_core::Envelope` instead of `panel_core::protocol::envelope::Envelope`.
pub use domain::origin::{Origin, OriginError, TargetOrigin};
pub use protocol::actions::{HostCommand, PanelEvent, PayloadError};
pub use protocol::codec::{classify_inbound, encode_envelope, Inbound, ProtocolError};
pub use protocol::envelope::{Envelope, RequestId, ResponsePayload, PROTOCOL_TAG};
