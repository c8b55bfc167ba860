//! A bridge with the standard panel listeners attached.
//!
//! The `panel-bridge` server hands every connection its own [`PanelSession`].
//! It answers:
//!
//! | action         | reply                                   |
//! |----------------|-----------------------------------------|
//! | `ping`         | `{ "pong": true, "echo": <data> }`      |
//! | `setCode`      | `{ "accepted": true, "bytes": <len> }`  |
//! | `setContent`   | `{ "accepted": true, "bytes": <len> }`  |
//! | `theme:change` | nothing (the theme is recorded)         |

use std::sync::{Arc, Mutex, PoisonError};

use panel_core::protocol::actions::Theme;
use panel_core::HostCommand;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::application::bridge::Bridge;
use crate::application::listener::ListenerResult;

/// What the host has pushed to this panel so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub source: Option<String>,
    pub theme: Option<Theme>,
}

/// One panel: a bridge plus its built-in listeners.
#[derive(Debug)]
pub struct PanelSession {
    id: Uuid,
    bridge: Bridge,
    state: Arc<Mutex<PanelState>>,
}

impl PanelSession {
    /// Attaches the built-in listeners to `bridge`.
    pub fn attach(bridge: Bridge) -> Self {
        let id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(PanelState::default()));

        bridge.on("ping", |data, _| {
            Ok(ListenerResult::value(json!({ "pong": true, "echo": data })))
        });

        let st = Arc::clone(&state);
        bridge.on_command(move |command, _| {
            let mut state = st.lock().unwrap_or_else(PoisonError::into_inner);
            match command {
                HostCommand::ThemeChange { theme, .. } => {
                    info!(session = %id, ?theme, "theme changed");
                    state.theme = Some(theme);
                    Ok(ListenerResult::none())
                }
                other => {
                    let text = other.source_text().unwrap_or_default().to_string();
                    let bytes = text.len();
                    state.source = Some(text);
                    Ok(ListenerResult::value(json!({ "accepted": true, "bytes": bytes })))
                }
            }
        });

        Self { id, bridge, state }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Snapshot of what the host has pushed.
    pub fn state(&self) -> PanelState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Destroys the underlying bridge.
    pub fn close(&self) {
        self.bridge.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::{InboundMessage, Standalone};
    use crate::domain::BridgeOptions;
    use std::time::Duration;

    fn session() -> PanelSession {
        let opts = BridgeOptions::default().with_ready_delay(Duration::from_secs(3600));
        PanelSession::attach(Bridge::create(opts, Arc::new(Standalone)))
    }

    fn inbound(action: &str, data: serde_json::Value) -> InboundMessage {
        InboundMessage::new(
            "https://host.example",
            json!({"type": "artifactuse", "action": action, "data": data}),
        )
    }

    #[tokio::test]
    async fn test_set_code_is_recorded() {
        // Arrange
        let session = session();

        // Act
        session
            .bridge()
            .receive(inbound("setCode", json!({"code": "const a = 1;"})));

        // Assert
        assert_eq!(session.state().source.as_deref(), Some("const a = 1;"));
    }

    #[tokio::test]
    async fn test_theme_change_is_recorded() {
        let session = session();

        session
            .bridge()
            .receive(inbound("theme:change", json!({"theme": "light"})));

        assert_eq!(session.state().theme, Some(Theme::Light));
    }

    #[tokio::test]
    async fn test_built_in_listeners_are_registered() {
        let session = session();
        let bridge = session.bridge();
        assert_eq!(bridge.listener_count("ping"), 1);
        for action in HostCommand::ACTIONS {
            assert_eq!(bridge.listener_count(action), 1);
        }
    }

    #[tokio::test]
    async fn test_close_destroys_bridge() {
        let session = session();
        session.close();
        assert!(session.bridge().is_destroyed());
        assert_eq!(session.bridge().listener_count("ping"), 0);
    }
}
