//! Bounded, ordered log of broadcast events replayed to joining clients.

use std::collections::VecDeque;

use crate::chat::models::HistoryEntry;

/// Default number of entries retained.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    max_messages: usize,
}

impl HistoryLedger {
    pub fn new(max_messages: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_messages,
        }
    }

    /// Push to the tail, evicting from the head once over capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_messages {
            self.entries.pop_front();
        }
    }

    /// Point every stored chat message from `sender_id` at `new_name`.
    ///
    /// Connect, disconnect and name-change records keep the names they were
    /// written with.
    pub fn rewrite_sender_name(&mut self, sender_id: &str, new_name: &str) -> usize {
        let mut rewritten = 0;
        for entry in self.entries.iter_mut() {
            if let HistoryEntry::ChatMessage {
                sender_id: id,
                sender_name,
                ..
            } = entry
            {
                if id == sender_id {
                    *sender_name = new_name.to_string();
                    rewritten += 1;
                }
            }
        }
        rewritten
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
