//! Domain layer for panel-bridge.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//!
//! Envelope and payload types live one level further down, in `panel-core`,
//! because hosts need them too.

pub mod config;

// Re-export so callers can write `domain::BridgeOptions`.
pub use config::{BridgeOptions, ServerConfig, DEFAULT_READY_DELAY};
