//! TOML configuration file for the `panel-bridge` server.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:24810"
//!
//! [bridge]
//! origin = "https://host.example"
//! debug = false
//! ready_delay_ms = 100
//! request_ids = "time_random"   # or "scoped"
//! ```
//!
//! Every field is optional.  A missing file section or key falls back to the
//! same default [`ServerConfig::default`] uses, so an empty file is valid.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the key is absent.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use panel_core::protocol::RequestIdStrategy;
use panel_core::Origin;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{BridgeOptions, ServerConfig, DEFAULT_READY_DELAY};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub bridge: BridgeSection,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

/// `[bridge]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// Allowed origin, or `"*"`.
    #[serde(default)]
    pub origin: Origin,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,
    #[serde(default)]
    pub request_ids: RequestIdStrategy,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            origin: Origin::Any,
            debug: false,
            ready_delay_ms: default_ready_delay_ms(),
            request_ids: RequestIdStrategy::default(),
        }
    }
}

fn default_bind() -> SocketAddr {
    ServerConfig::default().ws_bind_addr
}

fn default_ready_delay_ms() -> u64 {
    DEFAULT_READY_DELAY.as_millis() as u64
}

impl From<FileConfig> for ServerConfig {
    fn from(file: FileConfig) -> Self {
        Self {
            ws_bind_addr: file.server.bind,
            bridge: BridgeOptions {
                origin: file.bridge.origin,
                debug: file.bridge.debug,
                ready_delay: Duration::from_millis(file.bridge.ready_delay_ms),
                request_ids: file.bridge.request_ids,
            },
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a value has the
/// wrong type (including an invalid origin).
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads configuration from `path`.  The file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
