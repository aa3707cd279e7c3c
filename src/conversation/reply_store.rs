//! Bounded map from sent reply id to the conversation that produced it.
//!
//! Quoting a reply the bot sent resumes that conversation. Only the most
//! recently inserted replies are kept; eviction is strictly by insertion order,
//! lookups never refresh an entry.

use crate::MessageId;
use crate::config::DEFAULT_REPLY_CAPACITY;
use crate::conversation::ConversationHistory;

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
struct Entries {
    histories: HashMap<MessageId, ConversationHistory>,
    /// Insertion order, oldest first. Holds exactly the keys of `histories`.
    order: VecDeque<MessageId>,
}

/// Internally synchronized FIFO cache of resumable conversations.
#[derive(Debug)]
pub struct ReplyContextStore {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl ReplyContextStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record the history behind a sent message, evicting the oldest entry when full.
    ///
    /// Re-inserting a known id replaces its history and keeps its original position.
    pub fn put(&self, message_id: MessageId, history: ConversationHistory) {
        let mut entries = self.entries.lock();

        if entries.histories.insert(message_id, history).is_some() {
            return;
        }
        entries.order.push_back(message_id);

        if entries.order.len() > self.capacity
            && let Some(evicted) = entries.order.pop_front()
        {
            entries.histories.remove(&evicted);
            tracing::trace!(evicted, "reply context evicted");
        }
    }

    /// Copy of the history behind a sent message, if still cached.
    pub fn get(&self, message_id: MessageId) -> Option<ConversationHistory> {
        self.entries.lock().histories.get(&message_id).cloned()
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.entries.lock().histories.contains_key(&message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReplyContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_CAPACITY)
    }
}
