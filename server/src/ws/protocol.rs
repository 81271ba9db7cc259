//! JSON wire protocol over WebSocket text frames.
//!
//! Every frame in either direction is an envelope
//! `{"event": <name>, "request_id": <optional string>, "data": <payload>}`.
//! Requests that expect a response (`register`) carry a `request_id`, which
//! the server echoes on the reply.

use serde::{Deserialize, Serialize};

use crate::chat::models::{ChatMessagePayload, RegisterRequest, RenameRequest};
use crate::chat::{ConnectionId, HistoryEntry, Identity, ServerEvent};
use crate::error::ChatError;
use crate::state::AppState;
use crate::ws::broadcast;

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Register(RegisterRequest),
    Message(ChatMessagePayload),
    NewName(RenameRequest),
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub request_id: Option<String>,
    pub event: ClientEvent,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// `register` accepts named arguments or the positional `[id, display_name]` pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegisterArgs {
    Named {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        display_name: Option<String>,
    },
    Positional(Option<String>, Option<String>),
}

impl From<RegisterArgs> for RegisterRequest {
    fn from(args: RegisterArgs) -> Self {
        let (id, display_name) = match args {
            RegisterArgs::Named { id, display_name } => (id, display_name),
            RegisterArgs::Positional(id, display_name) => (id, display_name),
        };
        RegisterRequest { id, display_name }
    }
}

/// Decode one inbound text frame.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, ChatError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ChatError::Decode)?;

    let event = match raw.event.as_str() {
        "register" => {
            let request = if raw.data.is_null() {
                RegisterRequest::default()
            } else {
                serde_json::from_value::<RegisterArgs>(raw.data)
                    .map_err(ChatError::Decode)?
                    .into()
            };
            ClientEvent::Register(request)
        }
        "message" => {
            let entry: HistoryEntry =
                serde_json::from_value(raw.data).map_err(ChatError::Decode)?;
            match entry {
                HistoryEntry::ChatMessage {
                    sender_id,
                    sender_name,
                    text,
                } => ClientEvent::Message(ChatMessagePayload {
                    sender_id,
                    sender_name,
                    text,
                }),
                other => return Err(ChatError::UnexpectedMessageType(other.kind())),
            }
        }
        "new_name" => {
            ClientEvent::NewName(serde_json::from_value(raw.data).map_err(ChatError::Decode)?)
        }
        _ => return Err(ChatError::UnknownEvent(raw.event)),
    };

    Ok(ClientFrame {
        request_id: raw.request_id,
        event,
    })
}

#[derive(Serialize)]
#[serde(untagged)]
enum FrameData<'a> {
    Identity(&'a Identity),
    History(&'a [HistoryEntry]),
    Entry(&'a HistoryEntry),
}

#[derive(Serialize)]
struct ServerFrame<'a> {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
    data: FrameData<'a>,
}

/// Encode a server event as a text frame body.
pub fn encode_server_event(request_id: Option<&str>, event: &ServerEvent) -> Result<String, ChatError> {
    let data = match event {
        ServerEvent::Registered(identity) => FrameData::Identity(identity),
        ServerEvent::ChatHistory(history) => FrameData::History(history),
        ServerEvent::IncomingMessage(entry) | ServerEvent::UpdateName(entry) => {
            FrameData::Entry(entry)
        }
    };
    serde_json::to_string(&ServerFrame {
        event: event.name(),
        request_id,
        data,
    })
    .map_err(ChatError::Encode)
}

/// Handle an incoming text frame: decode, run it through the chatroom and
/// deliver whatever it emits.
///
/// Malformed frames are logged and dropped; they never affect other
/// connections.
pub fn handle_text_message(text: &str, conn: ConnectionId, state: &AppState) {
    let frame = match decode_client_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                conn_id = %conn,
                error = %e,
                "Ignoring malformed client event"
            );
            return;
        }
    };

    let Ok(mut chatroom) = state.chatroom.lock() else {
        tracing::error!(conn_id = %conn, "Chatroom lock poisoned, dropping event");
        return;
    };

    let outbound = match frame.event {
        ClientEvent::Register(request) => chatroom.register(conn, frame.request_id, request),
        ClientEvent::Message(payload) => chatroom.message(conn, payload),
        ClientEvent::NewName(request) => chatroom.rename(conn, request),
    };

    // Delivered under the lock so every recipient sees one global order.
    broadcast::deliver(&state.connections, &outbound);
}

/// Handle the transport losing a connection.
pub fn handle_disconnect(conn: ConnectionId, state: &AppState) {
    let Ok(mut chatroom) = state.chatroom.lock() else {
        tracing::error!(conn_id = %conn, "Chatroom lock poisoned, dropping disconnect");
        return;
    };
    let outbound = chatroom.disconnect(conn);
    broadcast::deliver(&state.connections, &outbound);
}
