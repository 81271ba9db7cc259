use std::sync::{Arc, Mutex};

use crate::chat::{ChatSettings, Chatroom};
use crate::ws::heartbeat::Heartbeat;
use crate::ws::{new_connection_registry, ConnectionRegistry};

/// The chatroom core behind one lock: each event runs to completion,
/// delivery included, before the next is handled.
pub type SharedChatroom = Arc<Mutex<Chatroom>>;

/// Shared application state passed to all handlers via axum State extractor.
///
/// Built once per server instance; tests can run several side by side.
#[derive(Clone)]
pub struct AppState {
    /// Session registry, history ledger and identity allocator
    pub chatroom: SharedChatroom,
    /// Every open WebSocket connection
    pub connections: ConnectionRegistry,
    /// Ping cadence and pong timeout applied to every connection
    pub heartbeat: Heartbeat,
}

impl AppState {
    pub fn new(settings: ChatSettings) -> Self {
        Self::with_chatroom(Chatroom::new(settings))
    }

    pub fn with_chatroom(chatroom: Chatroom) -> Self {
        Self {
            chatroom: Arc::new(Mutex::new(chatroom)),
            connections: new_connection_registry(),
            heartbeat: Heartbeat::default(),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}
