//! Error taxonomy shared by the registries and the session gateway.

use serde::{Deserialize, Serialize};

/// What kind of record a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Poll,
    Participant,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Participant => write!(f, "participant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("poll already exists: {0}")]
    PollExists(String),

    #[error("poll is closed: {0}")]
    PollClosed(String),

    #[error("answer {answer:?} is not an option of poll {poll_id}")]
    InvalidOption { poll_id: String, answer: String },

    #[error("participant {participant_id} already answered poll {poll_id}")]
    DuplicateSubmission {
        poll_id: String,
        participant_id: String,
    },

    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

impl PollError {
    pub fn poll_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Poll,
            id: id.into(),
        }
    }

    pub fn participant_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Participant,
            id: id.into(),
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PollExists(_) => "poll_exists",
            Self::PollClosed(_) => "poll_closed",
            Self::InvalidOption { .. } => "invalid_option",
            Self::DuplicateSubmission { .. } => "duplicate_submission",
            Self::MalformedEvent(_) => "malformed_event",
        }
    }
}

/// Serializable error body sent back to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&PollError> for ErrorResponse {
    fn from(err: &PollError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}
