use axum::extract::ws::Message;

use super::protocol::encode_server_event;
use super::ConnectionRegistry;
use crate::chat::{ConnectionId, Outbound, Target};

/// Deliver handler output in issue order.
///
/// Each event is encoded once and pushed onto the recipients' queues. Sends
/// are fire-and-forget: a closed queue means the connection is going away
/// and its actor will clean up.
pub fn deliver(registry: &ConnectionRegistry, outbound: &[Outbound]) {
    for item in outbound {
        let text = match encode_server_event(item.request_id.as_deref(), &item.event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(event = item.event.name(), error = %e, "Dropping unencodable event");
                continue;
            }
        };
        let msg = Message::Text(text.into());

        match item.target {
            Target::All => broadcast_to_all(registry, &msg),
            Target::Connection(conn) => {
                if !send_to_connection(registry, conn, &msg) {
                    tracing::debug!(
                        conn_id = %conn,
                        event = item.event.name(),
                        "Unicast target no longer connected"
                    );
                }
            }
        }
    }
}

/// Send a frame to every open connection.
pub fn broadcast_to_all(registry: &ConnectionRegistry, msg: &Message) {
    for entry in registry.iter() {
        let _ = entry.value().send(msg.clone());
    }
}

/// Send a frame to one connection. Returns false if it is gone.
pub fn send_to_connection(registry: &ConnectionRegistry, conn: ConnectionId, msg: &Message) -> bool {
    match registry.get(&conn) {
        Some(sender) => sender.send(msg.clone()).is_ok(),
        None => false,
    }
}
