//! Panel bridge server: entry point.
//!
//! Serves the panel message bridge over WebSocket.  Every connection gets
//! its own bridge, with the sender identity taken from the handshake's
//! `Origin` header, and the standard panel listeners attached (`ping`,
//! `setCode`, `setContent`, `theme:change`).  This is handy for driving a
//! panel's protocol from a host under development without a browser frame.
//!
//! # Usage
//!
//! ```text
//! panel-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML configuration file
//!   --bind <ADDR>              WebSocket listener address [default: 127.0.0.1:24810]
//!   --origin <ORIGIN>          Allowed origin, or "*" [default: *]
//!   --debug                    Log every inbound and outbound message
//!   --ready-delay-ms <MS>      Delay before panel:ready [default: 100]
//!   --request-ids <STRATEGY>   time-random | scoped [default: time-random]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence over environment variables, which take
//! precedence over the config file.
//!
//! | Variable                       | Description                 |
//! |--------------------------------|-----------------------------|
//! | `PANEL_BRIDGE_CONFIG`          | Config file path            |
//! | `PANEL_BRIDGE_BIND`            | WebSocket listener address  |
//! | `PANEL_BRIDGE_ORIGIN`          | Allowed origin              |
//! | `PANEL_BRIDGE_DEBUG`           | Per-message logging         |
//! | `PANEL_BRIDGE_READY_DELAY_MS`  | Ready-signal delay          |
//! | `PANEL_BRIDGE_REQUEST_IDS`     | Request-id strategy         |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use panel_core::protocol::RequestIdStrategy;
use panel_core::Origin;
use tracing::info;
use tracing_subscriber::EnvFilter;

use panel_bridge::domain::ServerConfig;
use panel_bridge::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Request-id strategy as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IdStrategyArg {
    TimeRandom,
    Scoped,
}

impl From<IdStrategyArg> for RequestIdStrategy {
    fn from(arg: IdStrategyArg) -> Self {
        match arg {
            IdStrategyArg::TimeRandom => RequestIdStrategy::TimeRandom,
            IdStrategyArg::Scoped => RequestIdStrategy::Scoped,
        }
    }
}

/// Panel message bridge over WebSocket.
#[derive(Debug, Parser)]
#[command(
    name = "panel-bridge",
    about = "Serves the Artifactuse panel message bridge over WebSocket",
    version
)]
struct Cli {
    /// TOML configuration file.  Options given here override it.
    #[arg(long, env = "PANEL_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address for the WebSocket server to listen on.
    #[arg(long, env = "PANEL_BRIDGE_BIND")]
    bind: Option<String>,

    /// The only origin whose messages are accepted, or `*` for any.
    ///
    /// Browsers send their page origin in the WebSocket handshake; clients
    /// that send none are treated as origin `null`.
    #[arg(long, env = "PANEL_BRIDGE_ORIGIN")]
    origin: Option<String>,

    /// Log every inbound and outbound message.
    #[arg(long, env = "PANEL_BRIDGE_DEBUG")]
    debug: bool,

    /// Milliseconds to wait before sending `panel:ready`.
    #[arg(long, env = "PANEL_BRIDGE_READY_DELAY_MS")]
    ready_delay_ms: Option<u64>,

    /// How request ids are generated.
    #[arg(long, value_enum, env = "PANEL_BRIDGE_REQUEST_IDS")]
    request_ids: Option<IdStrategyArg>,
}

impl Cli {
    /// Builds the server configuration: config file (if any), then CLI
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, or if `--bind`
    /// or `--origin` is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config: ServerConfig = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
                .into(),
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.ws_bind_addr = bind
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid WebSocket bind address: '{bind}'"))?;
        }
        if let Some(origin) = &self.origin {
            config.bridge.origin = origin
                .parse::<Origin>()
                .with_context(|| format!("invalid origin: '{origin}'"))?;
        }
        if self.debug {
            config.bridge.debug = true;
        }
        if let Some(ms) = self.ready_delay_ms {
            config.bridge.ready_delay = Duration::from_millis(ms);
        }
        if let Some(strategy) = self.request_ids {
            config.bridge.request_ids = strategy.into();
        }

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. CLI arguments are parsed with `clap`.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins; otherwise the
///    level is `info`, with this crate at `debug` when `--debug` is set.
/// 3. The configuration is assembled from the config file and CLI overrides.
/// 4. A Ctrl+C handler clears the shared `running` flag.
/// 5. [`run_server`] serves until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ─────────────────────────────────────────────────────────
    let default_filter = if cli.debug {
        "info,panel_bridge=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = cli.into_server_config()?;

    info!(
        "panel bridge starting: ws={}, origin={}, debug={}",
        config.ws_bind_addr, config.bridge.origin, config.bridge.debug
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ───────────────────────────────────────────────────────
    run_server(config, running).await?;

    info!("panel bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
