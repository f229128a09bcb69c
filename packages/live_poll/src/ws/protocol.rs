//! WebSocket Protocol Types
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": {...}}`.

use live_poll_core::{ErrorResponse, Poll, Results};
use serde::{Deserialize, Serialize};

/// Inbound frame before its payload is interpreted.
///
/// The payload stays untyped until the dispatch table has picked a handler,
/// so an unknown event name or a bad payload can be reported on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of `register-participant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterParticipant {
    pub id: String,
    pub name: String,
}

/// Payload of `submit-answer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    pub poll_id: String,
    pub student_id: String,
    pub answer: String,
}

/// Messages sent FROM the server TO clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// A presenter published a poll (broadcast)
    PollNew(Poll),

    /// Acknowledges `register-participant` (unicast)
    ParticipantRegistered { id: String, name: String },

    /// Fresh tally after an accepted answer (broadcast)
    ResultsUpdate(Results),

    /// A poll stopped taking answers: time ran out or a newer poll replaced it (broadcast)
    PollClosed { poll_id: String },

    /// An answer was not recorded (unicast to the submitter)
    SubmissionRejected {
        poll_id: String,
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// The inbound frame could not be handled (unicast)
    Error(ErrorResponse),
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PollNew(_) => "poll-new",
            Self::ParticipantRegistered { .. } => "participant-registered",
            Self::ResultsUpdate(_) => "results-update",
            Self::PollClosed { .. } => "poll-closed",
            Self::SubmissionRejected { .. } => "submission-rejected",
            Self::Error(_) => "error",
        }
    }
}
