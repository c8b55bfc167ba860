//! End-to-end tests for the WebSocket server.
//!
//! Each test binds an ephemeral port, serves it with [`serve`], and talks to
//! it with a tokio-tungstenite client that presents a chosen `Origin` header.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use panel_bridge::domain::{BridgeOptions, ServerConfig};
use panel_bridge::infrastructure::serve;
use panel_core::Origin;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const HOST: &str = "https://host.example";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Starts a server and returns its address and shutdown flag.
async fn start(bridge: BridgeOptions) -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let config = ServerConfig {
        ws_bind_addr: addr,
        bridge,
    };
    tokio::spawn(serve(listener, config, Arc::clone(&running)));
    (addr, running)
}

async fn connect(addr: SocketAddr, origin: Option<&'static str>) -> Client {
    let mut request = format!("ws://{addr}").into_client_request().unwrap();
    if let Some(origin) = origin {
        request
            .headers_mut()
            .insert("origin", HeaderValue::from_static(origin));
    }
    let (client, _) = connect_async(request).await.unwrap();
    client
}

async fn send(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

/// Reads frames until one with `action` arrives.
async fn read_action(client: &mut Client, action: &str) -> Value {
    loop {
        let frame = client.next().await.expect("stream ended").expect("ws error");
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["action"] == action {
                return value;
            }
        }
    }
}

fn request(action: &str, data: Value, id: &str) -> Value {
    json!({"type": "artifactuse", "action": action, "data": data, "requestId": id})
}

#[tokio::test]
async fn test_ping_is_answered_over_websocket() {
    // Arrange
    let opts = BridgeOptions::default().with_origin(HOST.parse().unwrap());
    let (addr, running) = start(opts).await;
    let mut client = connect(addr, Some(HOST)).await;

    // Act
    send(&mut client, request("ping", json!({"n": 1}), "p1")).await;
    let reply = timeout(Duration::from_secs(2), read_action(&mut client, "response"))
        .await
        .unwrap();

    // Assert
    assert_eq!(reply["data"]["requestId"], "p1");
    assert_eq!(reply["data"]["success"], true);
    assert_eq!(reply["data"]["data"], json!({"pong": true, "echo": {"n": 1}}));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_ready_signal_is_sent_after_connect() {
    let opts = BridgeOptions::default().with_ready_delay(Duration::from_millis(10));
    let (addr, running) = start(opts).await;
    let mut client = connect(addr, None).await;

    let ready = timeout(Duration::from_secs(2), read_action(&mut client, "panel:ready"))
        .await
        .unwrap();

    assert_eq!(ready["type"], "artifactuse");
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_set_code_is_acknowledged_with_length() {
    let (addr, running) = start(BridgeOptions::default()).await;
    let mut client = connect(addr, Some(HOST)).await;

    send(&mut client, request("setCode", json!({"code": "abcd"}), "c1")).await;
    let reply = timeout(Duration::from_secs(2), read_action(&mut client, "response"))
        .await
        .unwrap();

    assert_eq!(reply["data"]["data"], json!({"accepted": true, "bytes": 4}));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_foreign_origin_gets_no_answer() {
    // Arrange: server trusts HOST only; the client presents another origin.
    let opts = BridgeOptions::default()
        .with_origin(HOST.parse::<Origin>().unwrap())
        .with_ready_delay(Duration::from_millis(10));
    let (addr, running) = start(opts).await;
    let mut client = connect(addr, Some("https://evil.example")).await;

    // Act
    send(&mut client, request("ping", json!({}), "p1")).await;
    let outcome = timeout(Duration::from_millis(300), read_action(&mut client, "response")).await;

    // Assert: neither the response nor panel:ready (addressed to HOST) leaks.
    assert!(outcome.is_err());
    running.store(false, Ordering::Relaxed);
}
