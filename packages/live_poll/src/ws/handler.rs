//! WebSocket Handler
//!
//! One task set per connection: a broadcast forwarder, a socket writer, and
//! the inbound reader that feeds the dispatch table.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use live_poll_core::ConnectionId;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::context::ServerContext;
use super::dispatch::dispatch;
use super::protocol::ServerMessage;

/// Drive one client connection until either side hangs up.
pub async fn handle_poll_ws(socket: WebSocket, ctx: Arc<ServerContext>) {
    let connection_id = ConnectionId::new();
    info!(conn_id = %connection_id, "New WebSocket connection");
    ctx.metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) =
        mpsc::channel::<Arc<ServerMessage>>(ctx.config.websocket.send_channel_capacity);

    // Subscribe to fan-out and register for unicast
    let mut broadcast_rx = ctx.hub.attach(connection_id.clone(), tx.clone());

    let tx_broadcast = tx.clone();
    let metrics_broadcast = ctx.metrics.clone();
    let conn_broadcast = connection_id.clone();
    let broadcast_task = async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(msg) => {
                    if tx_broadcast.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    metrics_broadcast.messages_dropped(n);
                    warn!(conn_id = %conn_broadcast, "Broadcast lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    // Task to send messages to WebSocket
    let metrics_sender = ctx.metrics.clone();
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(msg.as_ref()) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics_sender.message_sent();
        }
    };

    // Task to handle incoming messages
    let ctx_input = ctx.clone();
    let conn_input = connection_id.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    ctx_input.metrics.event_received();
                    let outbound = dispatch(&ctx_input, &conn_input, text.as_str());
                    ctx_input.deliver(outbound);
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Binary(_)) => {
                    debug!(conn_id = %conn_input, "Ignoring binary frame");
                }
                // Ping/pong are answered by axum
                Ok(_) => {}
                Err(e) => {
                    debug!(conn_id = %conn_input, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    };

    // Wait for any task to complete
    tokio::select! {
        _ = ctx.shutdown.cancelled() => {},
        _ = broadcast_task => {},
        _ = sender_task => {},
        _ = input_task => {},
    }

    ctx.hub.detach(&connection_id);
    let pruned = ctx.participants.disconnect(&connection_id);
    ctx.metrics.connection_closed();
    info!(conn_id = %connection_id, pruned, "WebSocket connection closed");
}
