pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod heartbeat;
pub mod protocol;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chat::ConnectionId;

/// Sender half of a WebSocket connection's outbound queue.
/// Cloning it lets any part of the system push frames to that client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Every open WebSocket connection, registered with the chatroom or not.
pub type ConnectionRegistry = Arc<DashMap<ConnectionId, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}
