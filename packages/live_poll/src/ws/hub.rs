//! Broadcast hub
//!
//! One `tokio::sync::broadcast` channel fans out to every connection; a map
//! of per-connection queues serves unicast. Delivery is best-effort: nothing
//! here waits on a slow client.

use std::collections::HashMap;
use std::sync::Arc;

use live_poll_core::ConnectionId;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::protocol::ServerMessage;

/// Queue feeding one connection's socket writer.
pub type ConnectionSender = mpsc::Sender<Arc<ServerMessage>>;

pub struct BroadcastHub {
    all: broadcast::Sender<Arc<ServerMessage>>,
    connections: RwLock<HashMap<ConnectionId, ConnectionSender>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity.max(1));
        Self {
            all,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection for unicast and hand back its broadcast feed.
    pub fn attach(
        &self,
        connection: ConnectionId,
        tx: ConnectionSender,
    ) -> broadcast::Receiver<Arc<ServerMessage>> {
        let rx = self.all.subscribe();
        self.connections.write().insert(connection, tx);
        rx
    }

    pub fn detach(&self, connection: &ConnectionId) {
        self.connections.write().remove(connection);
    }

    /// Push to every attached connection. Returns how many receivers it reached.
    pub fn broadcast(&self, msg: ServerMessage) -> usize {
        let event = msg.event_name();
        // send() errors only when nobody is listening
        match self.all.send(Arc::new(msg)) {
            Ok(n) => {
                debug!(event, receivers = n, "Broadcast");
                n
            }
            Err(_) => 0,
        }
    }

    /// Push to one connection. Returns false if it is gone or its queue is full.
    pub fn unicast(&self, connection: &ConnectionId, msg: ServerMessage) -> bool {
        let Some(tx) = self.connections.read().get(connection).cloned() else {
            debug!(conn_id = %connection, "Unicast to unknown connection dropped");
            return false;
        };
        match tx.try_send(Arc::new(msg)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(
                    conn_id = %connection,
                    event = msg.event_name(),
                    "Send queue full, dropping unicast"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(poll_id: &str) -> ServerMessage {
        ServerMessage::PollClosed {
            poll_id: poll_id.into(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let hub = BroadcastHub::new(16);
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, _rx_b) = mpsc::channel(4);
        let mut feed_a = hub.attach(ConnectionId::new(), tx_a);
        let mut feed_b = hub.attach(ConnectionId::new(), tx_b);

        assert_eq!(hub.broadcast(closed("p1")), 2);
        assert_eq!(*feed_a.recv().await.unwrap(), closed("p1"));
        assert_eq!(*feed_b.recv().await.unwrap(), closed("p1"));
    }

    #[tokio::test]
    async fn test_broadcast_without_listeners_is_harmless() {
        let hub = BroadcastHub::new(16);
        assert_eq!(hub.broadcast(closed("p1")), 0);
    }

    #[tokio::test]
    async fn test_unicast_reaches_only_target() {
        let hub = BroadcastHub::new(16);
        let target = ConnectionId::new();
        let other = ConnectionId::new();
        let (tx_t, mut rx_t) = mpsc::channel(4);
        let (tx_o, mut rx_o) = mpsc::channel(4);
        let _feed_t = hub.attach(target.clone(), tx_t);
        let _feed_o = hub.attach(other, tx_o);

        assert!(hub.unicast(&target, closed("p1")));
        assert_eq!(*rx_t.recv().await.unwrap(), closed("p1"));
        assert!(rx_o.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unicast_after_detach_fails() {
        let hub = BroadcastHub::new(16);
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(4);
        let _feed = hub.attach(conn.clone(), tx);
        assert_eq!(hub.connection_count(), 1);

        hub.detach(&conn);
        assert_eq!(hub.connection_count(), 0);
        assert!(!hub.unicast(&conn, closed("p1")));
    }

    #[tokio::test]
    async fn test_unicast_full_queue_drops() {
        let hub = BroadcastHub::new(16);
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);
        let _feed = hub.attach(conn.clone(), tx);

        assert!(hub.unicast(&conn, closed("p1")));
        assert!(!hub.unicast(&conn, closed("p2")));
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips_ahead() {
        let hub = BroadcastHub::new(2);
        let (tx, _rx) = mpsc::channel(4);
        let mut feed = hub.attach(ConnectionId::new(), tx);

        for i in 0..5 {
            hub.broadcast(closed(&format!("p{i}")));
        }
        assert!(matches!(
            feed.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(*feed.recv().await.unwrap(), closed("p3"));
    }
}
