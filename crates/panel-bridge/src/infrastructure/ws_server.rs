//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket session, recording the
//!    `Origin` header presented in the handshake.
//! 3. Giving each session its own [`PanelSession`] (a bridge plus the
//!    built-in listeners) over a [`WsTransport`].
//! 4. Running a writer task that drains the bridge's outbound queue into the
//!    socket, while the session task feeds received frames to the bridge.
//! 5. Destroying the bridge when the socket closes.
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! # For beginners: why record the handshake `Origin`?
//!
//! The bridge only trusts messages whose sender identity matches its
//! configured origin.  On a WebSocket the only identity the browser vouches
//! for is the `Origin` header of the upgrade request, so every frame on the
//! connection is attributed to it.  Clients that send no header (non-browser
//! tools) are attributed to `"null"`, which only a wildcard bridge accepts.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::{Bridge, PanelSession};
use crate::domain::config::ServerConfig;
use crate::infrastructure::ws_transport::WsTransport;

/// Identity attributed to peers whose handshake carried no `Origin` header.
pub const NULL_ORIGIN: &str = "null";

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.ws_bind_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;

    info!("panel bridge listening on {}", config.ws_bind_addr);
    serve(listener, config, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Each accepted connection is handed off to a dedicated Tokio task so that
/// one slow panel never blocks others.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = Arc::new(config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the loop can re-check the `running` flag even when
        // nobody is connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                info!("new connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, cfg).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(raw_stream: TcpStream, peer_addr: SocketAddr, config: Arc<ServerConfig>) {
    match run_session(raw_stream, peer_addr, config).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single WebSocket session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
) -> anyhow::Result<()> {
    // ── Step 1: Handshake, capturing the Origin header ─────────────────────────
    let mut origin_header: Option<String> = None;
    let ws_stream = accept_hdr_async(raw_stream, |request: &Request, response: Response| {
        origin_header = request
            .headers()
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let peer_origin = origin_header.unwrap_or_else(|| NULL_ORIGIN.to_string());
    info!("session {peer_addr}: established (origin {peer_origin})");

    // ── Step 2: One bridge per connection ──────────────────────────────────────
    let (transport, mut out_rx) = WsTransport::new(peer_origin);
    let bridge = Bridge::create(config.bridge.clone(), Arc::new(transport.clone()));
    let session = PanelSession::attach(bridge);
    debug!("session {peer_addr}: panel session {}", session.id());

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Task A: outbound queue → socket ────────────────────────────────────────
    let writer_peer = peer_addr;
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                debug!("session {writer_peer}: send failed (peer disconnected)");
                break;
            }
        }
    });

    // ── Step 3: socket → bridge ────────────────────────────────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {peer_addr}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {peer_addr}: WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {peer_addr}: stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(text) => transport.deliver_text(&text),
            WsMessage::Binary(_) => {
                // The panel protocol is JSON text only.
                warn!("session {peer_addr}: unexpected binary frame (ignored)");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            WsMessage::Close(_) => {
                debug!("session {peer_addr}: Close frame received");
                break;
            }
        }
    }

    // ── Step 4: teardown ───────────────────────────────────────────────────────
    session.close();
    transport.close();
    writer.abort();

    Ok(())
}
