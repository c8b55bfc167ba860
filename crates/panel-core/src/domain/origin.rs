//! Origin identity of a remote endpoint.
//!
//! An origin is the `scheme://host[:port]` triple a browser attaches to every
//! cross-context message (for example `https://host.example`).  The same type
//! is used in two roles:
//!
//! - **Allowed origin**: inbound messages whose verified source differs are
//!   dropped.  [`Origin::Any`] (`"*"`) accepts every sender.
//! - **Target origin**: the identity an outbound message is addressed to.
//!   [`Origin::Any`] delivers to whoever is attached.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The wildcard spelling.
pub const WILDCARD: &str = "*";

/// Errors produced when parsing an origin string.
#[derive(Debug, Error, PartialEq)]
pub enum OriginError {
    /// The string was empty.
    #[error("origin must not be empty")]
    Empty,

    /// The string contained whitespace, which no serialized origin does.
    #[error("origin contains whitespace: {0:?}")]
    Whitespace(String),
}

/// A remote identity, or the wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Origin {
    /// Matches any sender / addresses any receiver.
    #[default]
    Any,
    /// One specific serialized origin.
    Exact(String),
}

/// Alias used where an origin plays the *addressee* role.
pub type TargetOrigin = Origin;

impl Origin {
    /// `true` for the wildcard.
    pub fn is_any(&self) -> bool {
        matches!(self, Origin::Any)
    }

    /// Whether a message whose verified source is `source` passes this gate.
    ///
    /// Matching is exact apart from one trailing `/`, which is ignored on
    /// both sides.  Browsers never put one on a serialized origin, so this
    /// only matters for hand-written configuration and non-browser peers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use panel_core::Origin;
    ///
    /// let allowed: Origin = "https://host.example".parse().unwrap();
    /// assert!(allowed.allows("https://host.example"));
    /// assert!(!allowed.allows("https://evil.example"));
    /// assert!(Origin::Any.allows("https://evil.example"));
    /// ```
    pub fn allows(&self, source: &str) -> bool {
        match self {
            Origin::Any => true,
            Origin::Exact(expected) => expected == normalise(source),
        }
    }

    /// The wire spelling: `"*"` or the origin itself.
    pub fn as_str(&self) -> &str {
        match self {
            Origin::Any => WILDCARD,
            Origin::Exact(o) => o,
        }
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(OriginError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(OriginError::Whitespace(s.to_string()));
        }
        if s == WILDCARD {
            return Ok(Origin::Any);
        }
        Ok(Origin::Exact(normalise(s).to_string()))
    }
}

impl TryFrom<String> for Origin {
    type Error = OriginError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Origin> for String {
    fn from(o: Origin) -> Self {
        o.as_str().to_string()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalise(origin: &str) -> &str {
    origin.strip_suffix('/').unwrap_or(origin)
}
