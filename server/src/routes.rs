use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Open WebSocket connections, registered or not
    pub connections: usize,
    /// Registered users
    pub users: usize,
    /// Entries currently held in history
    pub history: usize,
}

/// GET /health: liveness plus a few in-memory counters.
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let connections = state.connections.len();
    let chatroom = state
        .chatroom
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        users: chatroom.registry().len(),
        history: chatroom.history().len(),
    }))
}

/// Build the axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
}
