//! Session protocol handler.
//!
//! `Chatroom` owns the registry, the history ledger and the allocator for
//! one server instance. Each operation consumes one client or transport
//! event and returns the emissions it produced, in issue order; the caller
//! delivers them. Nothing here touches a socket.

use crate::chat::history::{HistoryLedger, DEFAULT_MAX_MESSAGES};
use crate::chat::identity::{IdentityAllocator, DEFAULT_MAX_ATTEMPTS};
use crate::chat::models::{
    ChatMessagePayload, ConnectionId, HistoryEntry, Identity, RegisterRequest, RenameRequest,
};
use crate::chat::policy::SenderPolicy;
use crate::chat::registry::SessionRegistry;

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Response to `register`, carrying the bound identity.
    Registered(Identity),
    ChatHistory(Vec<HistoryEntry>),
    IncomingMessage(HistoryEntry),
    /// Confirmation to a requester that their rename went through.
    UpdateName(HistoryEntry),
}

impl ServerEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Registered(_) => "register",
            ServerEvent::ChatHistory(_) => "chat_history",
            ServerEvent::IncomingMessage(_) => "incoming_message",
            ServerEvent::UpdateName(_) => "update_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    /// Every open connection, registered or not.
    All,
}

/// One emission produced by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    /// Set on responses to a client request.
    pub request_id: Option<String>,
    pub event: ServerEvent,
}

impl Outbound {
    fn reply(conn: ConnectionId, request_id: Option<String>, event: ServerEvent) -> Self {
        Self {
            target: Target::Connection(conn),
            request_id,
            event,
        }
    }

    fn unicast(conn: ConnectionId, event: ServerEvent) -> Self {
        Self::reply(conn, None, event)
    }

    fn broadcast(event: ServerEvent) -> Self {
        Self {
            target: Target::All,
            request_id: None,
            event,
        }
    }
}

/// Tunables for a chatroom instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub max_messages: usize,
    pub identity_attempts: usize,
    pub sender_policy: SenderPolicy,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            identity_attempts: DEFAULT_MAX_ATTEMPTS,
            sender_policy: SenderPolicy::Trust,
        }
    }
}

pub struct Chatroom {
    registry: SessionRegistry,
    history: HistoryLedger,
    allocator: IdentityAllocator,
    policy: SenderPolicy,
}

impl Chatroom {
    pub fn new(settings: ChatSettings) -> Self {
        Self::with_allocator(settings, IdentityAllocator::new(settings.identity_attempts))
    }

    pub fn with_allocator(settings: ChatSettings, allocator: IdentityAllocator) -> Self {
        Self {
            registry: SessionRegistry::new(),
            history: HistoryLedger::new(settings.max_messages),
            allocator,
            policy: settings.sender_policy,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Bind an identity to `conn`, replay history to it and announce it.
    pub fn register(
        &mut self,
        conn: ConnectionId,
        request_id: Option<String>,
        request: RegisterRequest,
    ) -> Vec<Outbound> {
        if let Some(existing) = self.registry.get(conn) {
            tracing::debug!(
                conn_id = %conn,
                user_id = %existing.id,
                "Duplicate register, answering with current identity"
            );
            return vec![Outbound::reply(
                conn,
                request_id,
                ServerEvent::Registered(existing.clone()),
            )];
        }

        let identity = match self.registry.register(
            conn,
            request.id,
            request.display_name,
            &mut self.allocator,
        ) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(conn_id = %conn, error = %e, "Registration failed");
                return Vec::new();
            }
        };

        tracing::info!(
            conn_id = %conn,
            user_id = %identity.id,
            display_name = %identity.display_name,
            "User registered"
        );

        let connected = HistoryEntry::connected(&identity);
        let mut out = vec![
            Outbound::reply(conn, request_id, ServerEvent::Registered(identity)),
            Outbound::unicast(conn, ServerEvent::ChatHistory(self.history.snapshot())),
        ];
        self.history.append(connected.clone());
        out.push(Outbound::broadcast(ServerEvent::IncomingMessage(connected)));
        out
    }

    /// Store and relay a chat message from a registered connection.
    pub fn message(&mut self, conn: ConnectionId, payload: ChatMessagePayload) -> Vec<Outbound> {
        let Some(sender) = self.registry.get(conn) else {
            tracing::debug!(conn_id = %conn, "Message from unregistered connection ignored");
            return Vec::new();
        };

        let entry = self.policy.admit(sender, payload);
        self.history.append(entry.clone());
        vec![Outbound::broadcast(ServerEvent::IncomingMessage(entry))]
    }

    /// Release the identity bound to `conn` and announce its departure.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let Some(identity) = self.registry.unregister(conn) else {
            tracing::debug!(conn_id = %conn, "Unregistered connection closed");
            return Vec::new();
        };

        tracing::info!(
            conn_id = %conn,
            user_id = %identity.id,
            display_name = %identity.display_name,
            "User disconnected"
        );

        let disconnected = HistoryEntry::disconnected(&identity);
        self.history.append(disconnected.clone());
        vec![Outbound::broadcast(ServerEvent::IncomingMessage(disconnected))]
    }

    /// Negotiate a display-name change for the identity bound to `conn`.
    ///
    /// A taken name is refused to the requester alone and leaves no trace in
    /// history. An accepted one rewrites past chat messages, re-sends the
    /// whole history to everyone, then announces the change.
    pub fn rename(&mut self, conn: ConnectionId, request: RenameRequest) -> Vec<Outbound> {
        let Some(identity) = self.registry.get(conn).cloned() else {
            tracing::debug!(conn_id = %conn, "Rename from unregistered connection ignored");
            return Vec::new();
        };
        let RenameRequest { new_name, .. } = request;
        let old_name = identity.display_name;

        if self.registry.is_name_active(&new_name) {
            tracing::debug!(
                conn_id = %conn,
                user_id = %identity.id,
                new_name = %new_name,
                "Rename rejected, name in use"
            );
            return vec![Outbound::unicast(
                conn,
                ServerEvent::IncomingMessage(HistoryEntry::NameChange {
                    sender_id: None,
                    old_name,
                    new_name,
                    rejected: true,
                }),
            )];
        }

        let rewritten = self.history.rewrite_sender_name(&identity.id, &new_name);
        let mut out = vec![Outbound::broadcast(ServerEvent::ChatHistory(
            self.history.snapshot(),
        ))];

        let change = HistoryEntry::NameChange {
            sender_id: Some(identity.id.clone()),
            old_name: old_name.clone(),
            new_name: new_name.clone(),
            rejected: false,
        };
        self.history.append(change.clone());
        out.push(Outbound::unicast(conn, ServerEvent::UpdateName(change.clone())));
        out.push(Outbound::broadcast(ServerEvent::IncomingMessage(change)));

        self.registry.rename_active(conn, &new_name);

        tracing::info!(
            conn_id = %conn,
            user_id = %identity.id,
            old_name = %old_name,
            new_name = %new_name,
            rewritten,
            "User renamed"
        );
        out
    }
}
