//! panel-bridge library crate.
//!
//! This crate provides the message bridge a sandboxed preview panel uses to
//! talk to the host that embeds it: envelope framing, origin gating, dispatch
//! to listeners, request/response correlation, the ready signal and teardown.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Host (JSON envelopes over any channel with a verified sender identity)
//!         ↕
//! [panel-bridge]
//!   ├── domain/           BridgeOptions, ServerConfig
//!   ├── application/      Bridge, listeners, Transport trait, PendingRequests
//!   └── infrastructure/
//!         ├── memory_channel/  In-process duplex channel
//!         ├── ws_transport/    Transport over one WebSocket
//!         ├── ws_server/       WebSocket accept loop (tokio-tungstenite)
//!         └── config_file/     TOML configuration
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O, no async and no frameworks.
//! - `application` depends on `domain` and `panel-core`; it reaches the
//!   outside world only through the injected `Transport`.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use panel_bridge::application::{Bridge, ListenerResult};
//! use panel_bridge::domain::BridgeOptions;
//! use panel_bridge::infrastructure::memory_channel;
//! use serde_json::json;
//!
//! let (transport, mut host) = memory_channel("https://host.example");
//! let bridge = Bridge::create(BridgeOptions::default(), Arc::new(transport));
//! bridge.on("ping", |data, _| Ok(ListenerResult::value(json!({ "echo": data }))));
//!
//! host.post(json!({
//!     "type": "artifactuse",
//!     "action": "ping",
//!     "data": 7,
//!     "requestId": "r1"
//! }));
//!
//! let reply = host.try_recv().unwrap();
//! assert_eq!(reply.envelope.action, "response");
//! assert_eq!(reply.envelope.data["data"]["echo"], 7);
//! ```

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the bridge and its collaborators.
pub mod application;

/// Infrastructure layer: concrete transports, WebSocket server, config file.
pub mod infrastructure;
