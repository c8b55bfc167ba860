//! Bridge configuration types.
//!
//! [`BridgeOptions`] is everything a single bridge instance needs to know at
//! construction time.  [`ServerConfig`] adds the settings of the
//! `panel-bridge` binary, which serves one bridge per WebSocket connection.
//!
//! # Design rationale
//!
//! Configuration is a plain struct with no global state and no environment
//! reads inside the domain.  The infrastructure layer populates it from CLI
//! arguments or a TOML file.

use std::net::SocketAddr;
use std::time::Duration;

use panel_core::protocol::RequestIdStrategy;
use panel_core::Origin;

/// Default delay before the automatic ready signal.
pub const DEFAULT_READY_DELAY: Duration = Duration::from_millis(100);

/// Construction options for a [`crate::application::Bridge`].
///
/// # Example
///
/// ```rust
/// use panel_bridge::domain::BridgeOptions;
///
/// let opts = BridgeOptions::default()
///     .with_origin("https://host.example".parse().unwrap())
///     .with_debug(true);
/// assert!(opts.debug);
/// assert_eq!(opts.origin.as_str(), "https://host.example");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// The only remote identity inbound messages are accepted from.
    ///
    /// [`Origin::Any`] accepts everyone and is only appropriate in local
    /// development.  When exact, it is also the default target for outbound
    /// messages until the first valid inbound message pins the remote.
    pub origin: Origin,

    /// Log every inbound and outbound message.
    pub debug: bool,

    /// How long to wait before emitting `panel:ready`, giving the host time
    /// to attach its listener.
    pub ready_delay: Duration,

    /// How request ids for correlated requests are generated.
    pub request_ids: RequestIdStrategy,
}

impl BridgeOptions {
    /// Sets the accepted origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Enables or disables per-message logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the ready-signal delay.
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Sets the request-id strategy.
    pub fn with_request_ids(mut self, strategy: RequestIdStrategy) -> Self {
        self.request_ids = strategy;
        self
    }

    /// Where outbound messages go before any remote has been pinned.
    pub fn default_target(&self) -> &Origin {
        &self.origin
    }
}

impl Default for BridgeOptions {
    /// | Field       | Default       |
    /// |-------------|---------------|
    /// | origin      | `*`           |
    /// | debug       | `false`       |
    /// | ready_delay | 100 ms        |
    /// | request_ids | `time_random` |
    fn default() -> Self {
        Self {
            origin: Origin::Any,
            debug: false,
            ready_delay: DEFAULT_READY_DELAY,
            request_ids: RequestIdStrategy::default(),
        }
    }
}

/// Runtime configuration of the `panel-bridge` WebSocket server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address and port the WebSocket server binds to.
    ///
    /// Defaults to loopback: hosts are expected to run on the same machine.
    pub ws_bind_addr: SocketAddr,

    /// Options applied to every per-connection bridge.
    pub bridge: BridgeOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from(([127, 0, 0, 1], 24810)),
            bridge: BridgeOptions::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
