use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = &state.context;
    let snapshot = ctx.metrics.snapshot();

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        connections: ctx.hub.connection_count() as u64,
        current_poll: ctx.polls.current_poll().map(|p| p.id),
        retained_polls: ctx.polls.len(),
        participants: ctx.participants.len(),
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.context.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
