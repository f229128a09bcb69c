//! Inbound event dispatch.
//!
//! Each inbound event name maps to one handler in [`HANDLERS`]. Handlers are
//! plain synchronous functions over the shared [`ServerContext`]: they apply
//! the registry mutation and return the messages to send, without touching a
//! socket. The connection task hands that list to `ServerContext::deliver`.

use chrono::{DateTime, Utc};
use live_poll_core::{ConnectionId, Poll, PollError, Submission};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::context::ServerContext;
use super::protocol::{InboundEnvelope, RegisterParticipant, ServerMessage, SubmitAnswer};

/// Options a poll must offer.
const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 4;

/// Something a handler wants sent or scheduled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// To every connection
    Broadcast(ServerMessage),
    /// To one connection
    Unicast(ConnectionId, ServerMessage),
    /// Close the poll once `at` has passed
    CloseAt { poll_id: String, at: DateTime<Utc> },
}

pub type Handler =
    fn(&ServerContext, &ConnectionId, serde_json::Value) -> Result<Vec<Outbound>, PollError>;

/// Inbound event name → handler.
pub const HANDLERS: &[(&str, Handler)] = &[
    ("create-poll", handle_create_poll as Handler),
    ("register-participant", handle_register_participant as Handler),
    ("submit-answer", handle_submit_answer as Handler),
];

pub fn handler_for(event: &str) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, handler)| *handler)
}

/// Handle one raw text frame from `origin`.
///
/// Never fails: an unparseable frame, unknown event, or rejected operation
/// becomes an `error` message for the sender and nothing else. Accepted
/// answers are broadcast by the handler itself and leave nothing to deliver.
pub fn dispatch(ctx: &ServerContext, origin: &ConnectionId, text: &str) -> Vec<Outbound> {
    let result = serde_json::from_str::<InboundEnvelope>(text)
        .map_err(|e| PollError::MalformedEvent(format!("invalid frame: {e}")))
        .and_then(|envelope| {
            let handler = handler_for(&envelope.event).ok_or_else(|| {
                PollError::MalformedEvent(format!("unknown event: {}", envelope.event))
            })?;
            debug!(conn_id = %origin, event = %envelope.event, "Dispatching");
            handler(ctx, origin, envelope.data)
        });

    match result {
        Ok(outbound) => outbound,
        Err(e) => {
            warn!(conn_id = %origin, "Dropping event: {}", e);
            if matches!(e, PollError::MalformedEvent(_)) {
                ctx.metrics.malformed_event();
            }
            vec![Outbound::Unicast(
                origin.clone(),
                ServerMessage::Error((&e).into()),
            )]
        }
    }
}

fn parse_payload<T: DeserializeOwned>(
    event: &str,
    data: serde_json::Value,
) -> Result<T, PollError> {
    serde_json::from_value(data)
        .map_err(|e| PollError::MalformedEvent(format!("{event}: {e}")))
}

fn validate_poll(poll: &Poll) -> Result<(), PollError> {
    let malformed =
        |reason: &str| Err(PollError::MalformedEvent(format!("create-poll: {reason}")));
    if !poll.is_active {
        return malformed("poll must be created active");
    }
    if poll.id.trim().is_empty() {
        return malformed("empty id");
    }
    if poll.question.trim().is_empty() {
        return malformed("empty question");
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&poll.options.len()) {
        return malformed(&format!(
            "expected {MIN_OPTIONS}-{MAX_OPTIONS} options, got {}",
            poll.options.len()
        ));
    }
    if poll.options.iter().any(|o| o.trim().is_empty()) {
        return malformed("empty option label");
    }
    Ok(())
}

fn handle_create_poll(
    ctx: &ServerContext,
    _origin: &ConnectionId,
    data: serde_json::Value,
) -> Result<Vec<Outbound>, PollError> {
    let poll: Poll = parse_payload("create-poll", data)?;
    validate_poll(&poll)?;

    let created = ctx.polls.create_poll(poll)?;
    ctx.metrics.poll_created();

    let mut outbound = Vec::with_capacity(3);
    if let Some(retired) = created.retired {
        outbound.push(Outbound::Broadcast(ServerMessage::PollClosed {
            poll_id: retired,
        }));
    }
    if let Some(at) = created.closes_at {
        outbound.push(Outbound::CloseAt {
            poll_id: created.poll.id.clone(),
            at,
        });
    }
    outbound.push(Outbound::Broadcast(ServerMessage::PollNew(created.poll)));
    Ok(outbound)
}

fn handle_register_participant(
    ctx: &ServerContext,
    origin: &ConnectionId,
    data: serde_json::Value,
) -> Result<Vec<Outbound>, PollError> {
    let RegisterParticipant { id, name } = parse_payload("register-participant", data)?;
    if id.trim().is_empty() {
        return Err(PollError::MalformedEvent(
            "register-participant: empty id".into(),
        ));
    }

    ctx.participants.register(&id, &name, origin.clone());
    ctx.metrics.participant_registered();
    debug!(conn_id = %origin, participant_id = %id, "Participant registered");

    Ok(vec![Outbound::Unicast(
        origin.clone(),
        ServerMessage::ParticipantRegistered { id, name },
    )])
}

fn handle_submit_answer(
    ctx: &ServerContext,
    origin: &ConnectionId,
    data: serde_json::Value,
) -> Result<Vec<Outbound>, PollError> {
    let SubmitAnswer {
        poll_id,
        student_id,
        answer,
    } = parse_payload("submit-answer", data)?;

    // Publish while the registry lock is held so tallies go out in the
    // order they were recorded.
    let submission = ctx
        .polls
        .submit_answer_with(&poll_id, &student_id, &answer, |results| {
            ctx.hub.broadcast(ServerMessage::ResultsUpdate(results.clone()));
        });

    let rejection = match submission {
        Ok(Submission::Accepted(results)) => {
            ctx.metrics.answer_accepted();
            debug!(
                poll_id = %poll_id,
                participant_id = %student_id,
                total = results.total_responses,
                "Answer recorded"
            );
            return Ok(Vec::new());
        }
        Ok(Submission::Duplicate) => PollError::DuplicateSubmission {
            poll_id: poll_id.clone(),
            participant_id: student_id,
        },
        Err(e) => e,
    };

    ctx.metrics.answer_rejected();
    debug!(conn_id = %origin, poll_id = %poll_id, "Answer rejected: {}", rejection);
    Ok(vec![Outbound::Unicast(
        origin.clone(),
        ServerMessage::SubmissionRejected {
            poll_id,
            error: (&rejection).into(),
        },
    )])
}
