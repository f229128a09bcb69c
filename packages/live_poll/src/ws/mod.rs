//! Session Gateway
//!
//! One WebSocket per client carrying JSON events:
//! - Inbound `create-poll`, `register-participant`, `submit-answer`
//! - Outbound fan-out of new polls and live results to every connection
//! - Outbound acknowledgments and rejections to the sender only

mod context;
mod dispatch;
mod handler;
mod hub;
mod protocol;


pub use context::ServerContext;
pub use handler::handle_poll_ws;
