//! Chatroom core: identities, sessions, history and the session protocol.

pub mod history;
pub mod identity;
pub mod models;
pub mod policy;
pub mod registry;
pub mod session;

pub use history::HistoryLedger;
pub use identity::IdentityAllocator;
pub use models::{ConnectionId, HistoryEntry, Identity};
pub use policy::SenderPolicy;
pub use registry::SessionRegistry;
pub use session::{ChatSettings, Chatroom, Outbound, ServerEvent, Target};
