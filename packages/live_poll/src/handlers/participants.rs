use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// One row of the participant roster.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    /// Whether the registering connection is still open
    pub connected: bool,
    pub registered_at: DateTime<Utc>,
}

/// Everyone who has registered, oldest first.
pub async fn participants_handler(State(state): State<AppState>) -> Json<Vec<RosterEntry>> {
    let roster = state
        .context
        .participants
        .roster()
        .into_iter()
        .map(|p| RosterEntry {
            connected: p.connection.is_some(),
            id: p.id,
            name: p.name,
            registered_at: p.registered_at,
        })
        .collect();
    Json(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::metrics::ServerMetrics;
    use crate::ws::ServerContext;
    use live_poll_core::ConnectionId;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_roster_lists_participants_with_presence() {
        let context = Arc::new(ServerContext::new(
            Arc::new(ServerConfig::default()),
            Arc::new(ServerMetrics::new()),
        ));
        let gone = ConnectionId::new();
        context.participants.register("s1", "Ada", gone.clone());
        context
            .participants
            .register("s2", "Grace", ConnectionId::new());
        context.participants.disconnect(&gone);

        let Json(roster) = participants_handler(State(AppState {
            context: context.clone(),
        }))
        .await;

        assert_eq!(roster.len(), 2);
        let ada = roster.iter().find(|p| p.id == "s1").unwrap();
        assert_eq!(ada.name, "Ada");
        assert!(!ada.connected);
        assert!(roster.iter().find(|p| p.id == "s2").unwrap().connected);

        let json = serde_json::to_value(&roster[0]).unwrap();
        assert!(json.get("registeredAt").is_some());
    }
}
