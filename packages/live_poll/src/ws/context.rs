//! Server context
//!
//! The registries, hub and counters every connection shares. Built once at
//! startup and handed to each WebSocket by `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use live_poll_core::{ParticipantRegistry, PollRegistry};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;

use super::dispatch::Outbound;
use super::hub::BroadcastHub;
use super::protocol::ServerMessage;

pub struct ServerContext {
    pub polls: PollRegistry,
    pub participants: ParticipantRegistry,
    pub hub: BroadcastHub,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
    /// Cancelled on shutdown to stop poll expiry timers.
    pub shutdown: CancellationToken,
}

impl ServerContext {
    pub fn new(config: Arc<ServerConfig>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            polls: PollRegistry::new(config.polls.clone()),
            participants: ParticipantRegistry::new(),
            hub: BroadcastHub::new(config.websocket.broadcast_capacity),
            metrics,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Carry out what a handler asked for.
    ///
    /// Must run inside a tokio runtime: `CloseAt` spawns a timer.
    pub fn deliver(self: &Arc<Self>, outbound: Vec<Outbound>) {
        for out in outbound {
            match out {
                Outbound::Broadcast(msg) => {
                    self.hub.broadcast(msg);
                }
                Outbound::Unicast(connection, msg) => {
                    if !self.hub.unicast(&connection, msg) {
                        self.metrics.messages_dropped(1);
                    }
                }
                Outbound::CloseAt { poll_id, at } => self.schedule_close(poll_id, at),
            }
        }
    }

    fn schedule_close(self: &Arc<Self>, poll_id: String, at: DateTime<Utc>) {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let ctx = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => ctx.expire(&poll_id, at),
            }
        });
    }

    /// Close a poll whose time limit `deadline` elapsed and tell everyone.
    pub fn expire(&self, poll_id: &str, deadline: DateTime<Utc>) {
        match self.polls.expire_poll(poll_id, deadline) {
            Ok(true) => {
                self.hub.broadcast(ServerMessage::PollClosed {
                    poll_id: poll_id.to_string(),
                });
            }
            // Retired by a newer poll, or the id now names a different poll
            Ok(false) => {}
            Err(e) => debug!(poll_id, "Expiry skipped: {}", e),
        }
    }
}
