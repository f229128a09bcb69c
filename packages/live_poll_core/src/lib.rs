//! Poll state, vote aggregation, and participant presence for Live Poll.
//!
//! Everything here is synchronous and transport-agnostic. The `live_poll`
//! server wraps these registries in its WebSocket gateway.

pub mod aggregate;
pub mod error;
pub mod model;
pub mod participants;
pub mod polls;

pub use aggregate::compute_results;
pub use error::{ErrorResponse, PollError, RecordKind};
pub use model::{ConnectionId, Participant, Poll, RecordedAnswer, Results};
pub use participants::ParticipantRegistry;
pub use polls::{PollCreated, PollRegistry, PollRegistryConfig, Submission};
