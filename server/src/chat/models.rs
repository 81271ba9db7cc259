//! Wire-visible chat types shared by the registry, the history ledger and
//! the session handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque per-connection handle assigned by the transport.
///
/// Distinct from the user-level `Identity::id`, which a client may carry
/// across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The (user id, display name) pair bound to an active connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

/// One broadcast-worthy event, as stored in the history and sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HistoryEntry {
    Connected {
        sender_id: String,
        sender_name: String,
    },
    Disconnected {
        sender_id: String,
        sender_name: String,
    },
    #[serde(rename = "chatmessage")]
    ChatMessage {
        sender_id: String,
        sender_name: String,
        text: String,
    },
    #[serde(rename = "namechange")]
    NameChange {
        /// Absent on the rejection notice sent back to a requester.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        old_name: String,
        new_name: String,
        rejected: bool,
    },
}

impl HistoryEntry {
    pub fn connected(identity: &Identity) -> Self {
        Self::Connected {
            sender_id: identity.id.clone(),
            sender_name: identity.display_name.clone(),
        }
    }

    pub fn disconnected(identity: &Identity) -> Self {
        Self::Disconnected {
            sender_id: identity.id.clone(),
            sender_name: identity.display_name.clone(),
        }
    }

    /// Wire name of the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::ChatMessage { .. } => "chatmessage",
            Self::NameChange { .. } => "namechange",
        }
    }
}

/// Chat message exactly as a client submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
}

impl From<ChatMessagePayload> for HistoryEntry {
    fn from(payload: ChatMessagePayload) -> Self {
        HistoryEntry::ChatMessage {
            sender_id: payload.sender_id,
            sender_name: payload.sender_name,
            text: payload.text,
        }
    }
}

/// `register` arguments: a previously issued id and display name, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterRequest {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// `new_name` arguments. The claimed `sender_id` is informational only; the
/// server renames whichever identity is bound to the requesting connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub sender_id: Option<String>,
    pub new_name: String,
}
