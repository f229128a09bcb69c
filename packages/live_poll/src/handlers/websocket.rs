use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Upgrade to the poll WebSocket; all further traffic is events.
pub async fn poll_websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let ctx = state.context.clone();
    ws.on_upgrade(move |socket| ws::handle_poll_ws(socket, ctx))
}
