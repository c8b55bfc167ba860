//! Request id generation for correlated requests.
//!
//! # What is a request id? (for beginners)
//!
//! When a panel asks the host for something that will be answered later
//! (for example "please run this prompt through the assistant"), it attaches a
//! *request id* to the message.  The host echoes the id back in its
//! `"response"` envelope, so the panel can match the answer to the question
//! even if several requests are in flight and answers arrive out of order.
//!
//! # Strategies
//!
//! - [`RequestIdStrategy::TimeRandom`] (default) – `ai-1700000000000-3f9a0c1b2`:
//!   current time plus a random suffix.  Uniqueness is best effort, which is
//!   enough for a single in-flight exchange.
//! - [`RequestIdStrategy::Scoped`] – `ai-5b2e7d10-0`, `ai-5b2e7d10-1`, ...:
//!   a monotonic counter inside a random per-generator namespace.  Never
//!   collides within one generator, and two generators only collide if their
//!   namespaces do.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::envelope::{now_millis, RequestId};

/// Length of the random suffix in time+random ids.
const RANDOM_SUFFIX_LEN: usize = 9;

/// Length of the namespace in scoped ids.
const NAMESPACE_LEN: usize = 8;

/// How request ids are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestIdStrategy {
    /// Current time in milliseconds plus a random suffix.
    #[default]
    TimeRandom,
    /// Monotonic counter inside a per-generator namespace.
    Scoped,
}

/// Thread-safe request id generator.
///
/// # Examples
///
/// ```rust
/// use panel_core::protocol::{RequestIdGenerator, RequestIdStrategy};
///
/// let ids = RequestIdGenerator::new(RequestIdStrategy::Scoped);
/// let a = ids.next("ai");
/// let b = ids.next("ai");
/// assert!(a.starts_with("ai-"));
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct RequestIdGenerator {
    strategy: RequestIdStrategy,
    namespace: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator with a fresh random namespace.
    pub fn new(strategy: RequestIdStrategy) -> Self {
        Self {
            strategy,
            namespace: random_hex(NAMESPACE_LEN),
            counter: AtomicU64::new(0),
        }
    }

    /// The strategy this generator was created with.
    pub fn strategy(&self) -> RequestIdStrategy {
        self.strategy
    }

    /// Returns a new id of the form `{prefix}-...`.
    pub fn next(&self, prefix: &str) -> RequestId {
        match self.strategy {
            RequestIdStrategy::TimeRandom => {
                format!("{prefix}-{}-{}", now_millis(), random_hex(RANDOM_SUFFIX_LEN))
            }
            RequestIdStrategy::Scoped => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                format!("{prefix}-{}-{n}", self.namespace)
            }
        }
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(RequestIdStrategy::default())
    }
}

/// `len` lowercase hex characters taken from a v4 UUID (at most 32).
fn random_hex(len: usize) -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(len);
    s
}
