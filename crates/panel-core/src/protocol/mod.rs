//! Protocol module containing the envelope, payload schemas, and the JSON codec.

pub mod actions;
pub mod codec;
pub mod envelope;
pub mod request_id;

pub use actions::{HostCommand, PanelEvent, PayloadError};
pub use codec::{classify_inbound, encode_envelope, Inbound, ProtocolError};
pub use envelope::*;
pub use request_id::{RequestIdGenerator, RequestIdStrategy};
