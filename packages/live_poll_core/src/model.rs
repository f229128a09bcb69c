//! Records exchanged between the registries and the gateway.
//!
//! Field names on the wire are camelCase to match what the browser client
//! already sends and renders.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds a poll stays open when the presenter does not say otherwise.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 60;

fn default_time_limit() -> u64 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_active() -> bool {
    true
}

/// A single multiple-choice question broadcast by the presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Seconds participants have to answer. Zero means no limit.
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,
    /// Client-supplied creation time, epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Poll {
    pub fn has_option(&self, answer: &str) -> bool {
        self.options.iter().any(|o| o == answer)
    }
}

/// One participant's answer to one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub participant_id: String,
    pub option: String,
    /// Position in the poll's submission order, starting at 0.
    pub sequence: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Per-option tally for a poll. Derived, never stored authoritatively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    pub poll_id: String,
    pub results: BTreeMap<String, u64>,
    pub total_responses: u64,
}

/// Opaque handle naming one live WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered voter and the connection it was last seen on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// `None` once the connection that registered it has gone away.
    #[serde(skip)]
    pub connection: Option<ConnectionId>,
    pub registered_at: DateTime<Utc>,
}
