//! Session registry: which identity each live connection holds.
//!
//! Lookups by user id and by display name go through key indexes kept in
//! step with the primary map, so uniqueness checks do not scan sessions.

use std::collections::HashMap;

use crate::chat::identity::IdentityAllocator;
use crate::chat::models::{ConnectionId, Identity};
use crate::error::ChatError;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Identity>,
    by_id: HashMap<String, ConnectionId>,
    by_name: HashMap<String, ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identity to `conn`.
    ///
    /// A proposed id or name is kept unless another connection currently
    /// holds it, in which case a fresh one is allocated. A stale id that no
    /// live session holds is handed back unchanged. Any earlier entry for
    /// `conn` is replaced.
    pub fn register(
        &mut self,
        conn: ConnectionId,
        proposed_id: Option<String>,
        proposed_name: Option<String>,
        allocator: &mut IdentityAllocator,
    ) -> Result<Identity, ChatError> {
        let id = match proposed_id {
            Some(id) if !self.is_id_held_elsewhere(&id, conn) => id,
            _ => allocator.new_id(self)?,
        };
        let display_name = match proposed_name {
            Some(name) if !self.is_name_held_elsewhere(&name, conn) => name,
            _ => allocator.new_display_name(self)?,
        };

        self.unregister(conn);

        let identity = Identity { id, display_name };
        self.by_id.insert(identity.id.clone(), conn);
        self.by_name.insert(identity.display_name.clone(), conn);
        self.sessions.insert(conn, identity.clone());
        Ok(identity)
    }

    /// Remove and return the identity bound to `conn`, if any.
    pub fn unregister(&mut self, conn: ConnectionId) -> Option<Identity> {
        let identity = self.sessions.remove(&conn)?;
        self.by_id.remove(&identity.id);
        self.by_name.remove(&identity.display_name);
        Some(identity)
    }

    pub fn get(&self, conn: ConnectionId) -> Option<&Identity> {
        self.sessions.get(&conn)
    }

    pub fn is_id_active(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn is_name_active(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Change the display name bound to `conn` in place.
    ///
    /// Uniqueness is the caller's responsibility; this does not re-check.
    pub fn rename_active(&mut self, conn: ConnectionId, new_name: &str) {
        let Some(identity) = self.sessions.get_mut(&conn) else {
            return;
        };
        let old_name = std::mem::replace(&mut identity.display_name, new_name.to_string());
        if self.by_name.get(&old_name) == Some(&conn) {
            self.by_name.remove(&old_name);
        }
        self.by_name.insert(new_name.to_string(), conn);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.sessions.values()
    }

    fn is_id_held_elsewhere(&self, id: &str, conn: ConnectionId) -> bool {
        self.by_id.get(id).is_some_and(|holder| *holder != conn)
    }

    fn is_name_held_elsewhere(&self, name: &str, conn: ConnectionId) -> bool {
        self.by_name.get(name).is_some_and(|holder| *holder != conn)
    }
}
