//! Trust boundary for sender fields in client-submitted chat messages.
//!
//! Clients put their own `sender_id` and `sender_name` in each message. By
//! default those are relayed as sent; `Enforce` replaces them with the
//! identity the registry holds for the submitting connection.

use serde::{Deserialize, Serialize};

use crate::chat::models::{ChatMessagePayload, HistoryEntry, Identity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderPolicy {
    #[default]
    Trust,
    Enforce,
}

impl SenderPolicy {
    /// Turn a submitted payload into the entry that gets stored and relayed.
    pub fn admit(&self, sender: &Identity, payload: ChatMessagePayload) -> HistoryEntry {
        match self {
            SenderPolicy::Trust => {
                if payload.sender_id != sender.id || payload.sender_name != sender.display_name {
                    tracing::debug!(
                        user_id = %sender.id,
                        claimed_id = %payload.sender_id,
                        claimed_name = %payload.sender_name,
                        "Relaying chat message with client-claimed sender"
                    );
                }
                payload.into()
            }
            SenderPolicy::Enforce => HistoryEntry::ChatMessage {
                sender_id: sender.id.clone(),
                sender_name: sender.display_name.clone(),
                text: payload.text,
            },
        }
    }
}
