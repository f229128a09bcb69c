//! Server metrics for observability
//!
//! Lock-free counters bumped by the gateway, exposed as JSON on `/metrics`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Message metrics
    /// Inbound events received from clients
    pub events_received: AtomicU64,
    /// Inbound events that could not be parsed or were unknown
    pub malformed_events: AtomicU64,
    /// Messages written to client sockets
    pub messages_sent: AtomicU64,
    /// Messages dropped due to backpressure or lag
    pub messages_dropped: AtomicU64,

    // Poll metrics
    pub polls_created: AtomicU64,
    pub participants_registered: AtomicU64,
    pub answers_accepted: AtomicU64,
    /// Duplicate, late, off-menu, or unknown-poll submissions
    pub answers_rejected: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_event(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_dropped(&self, n: u64) {
        self.messages_dropped.fetch_add(n, Ordering::Relaxed);
    }

    // Poll tracking
    pub fn poll_created(&self) {
        self.polls_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn participant_registered(&self) {
        self.participants_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn answer_accepted(&self) {
        self.answers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn answer_rejected(&self) {
        self.answers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.events_received.load(Ordering::Relaxed),
                malformed: self.malformed_events.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            polls: PollMetrics {
                created: self.polls_created.load(Ordering::Relaxed),
                participants_registered: self.participants_registered.load(Ordering::Relaxed),
                answers_accepted: self.answers_accepted.load(Ordering::Relaxed),
                answers_rejected: self.answers_rejected.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub polls: PollMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub malformed: u64,
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollMetrics {
    pub created: u64,
    pub participants_registered: u64,
    pub answers_accepted: u64,
    pub answers_rejected: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub current_poll: Option<String>,
    pub retained_polls: usize,
    pub participants: usize,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracking() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        let snap = metrics.snapshot();
        assert_eq!(snap.connections.active, 1);
        assert_eq!(snap.connections.total, 2);
    }

    #[test]
    fn test_answer_tracking() {
        let metrics = ServerMetrics::new();
        metrics.answer_accepted();
        metrics.answer_accepted();
        metrics.answer_rejected();
        metrics.messages_dropped(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.polls.answers_accepted, 2);
        assert_eq!(snap.polls.answers_rejected, 1);
        assert_eq!(snap.messages.dropped, 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = ServerMetrics::new().snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["connections"]["active"], 0);
        assert_eq!(json["polls"]["created"], 0);
    }
}
