//! Infrastructure layer for panel-bridge.
//!
//! The infrastructure layer provides concrete [`Transport`]s and the I/O
//! around them.
//!
//! # Responsibilities
//!
//! - An in-memory duplex channel for tests and in-process embedding
//! - A WebSocket transport whose sender identity is the handshake `Origin`
//! - The WebSocket accept loop and per-session tasks
//! - Reading the TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Origin gating and dispatch (that is the application layer)
//! - Envelope definitions (those live in `panel-core`)
//!
//! [`Transport`]: crate::application::Transport

pub mod config_file;
pub mod memory_channel;
pub mod ws_server;
pub mod ws_transport;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{load_config, parse_config, ConfigError, FileConfig};
pub use memory_channel::{memory_channel, ChannelError, HostEndpoint, MemoryTransport, PostedMessage};
pub use ws_server::{run_server, serve};
pub use ws_transport::WsTransport;
