//! Entity store - the in-memory projection the UI reads.
//!
//! The store is a pure ordered map of maps: per-conversation message windows
//! keyed by `(created_at, insertion sequence)` and a conversation summary
//! list keyed by activity time descending. All writes are merges keyed by
//! identity, never positional, so the ordering and no-duplicate invariants
//! hold structurally after every public operation.

use crate::model::{ConversationSummary, Message, MessageId};
use crate::{ConversationId, Seq, Timestamp};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Ordering key of a message within its conversation window.
type OrderKey = (Timestamp, Seq);

/// Ordering key of a summary row: activity descending, id ascending on ties.
type SummaryKey = (Reverse<Timestamp>, ConversationId);

/// Result of writing a message into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New entry; `at_tail` is false when it landed before existing entries
    Inserted { at_tail: bool },
    /// Existing identity updated; `reordered` when a changed `created_at`
    /// moved it within the window
    Updated { reordered: bool },
    /// Write carried no field changes
    Unchanged,
}

#[derive(Debug, Default)]
struct ConversationWindow {
    by_order: BTreeMap<OrderKey, Message>,
    by_id: HashMap<MessageId, OrderKey>,
}

impl ConversationWindow {
    fn is_empty(&self) -> bool {
        self.by_order.is_empty()
    }
}

/// Ordered, deduplicated in-memory projection of conversations and messages.
#[derive(Debug, Default)]
pub struct EntityStore {
    windows: HashMap<ConversationId, ConversationWindow>,
    summaries: BTreeMap<SummaryKey, ConversationSummary>,
    summary_index: HashMap<ConversationId, SummaryKey>,
    next_seq: Seq,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of a conversation in `(created_at, insertion sequence)` order.
    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        match self.windows.get(conversation_id) {
            Some(window) => window.by_order.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Point lookup by identity.
    pub fn message(&self, conversation_id: &str, id: &MessageId) -> Option<&Message> {
        let window = self.windows.get(conversation_id)?;
        let key = window.by_id.get(id)?;
        window.by_order.get(key)
    }

    /// Whether a message with this identity exists in the conversation.
    pub fn contains_message(&self, conversation_id: &str, id: &MessageId) -> bool {
        self.message(conversation_id, id).is_some()
    }

    /// Number of messages held for a conversation.
    pub fn message_count(&self, conversation_id: &str) -> usize {
        self.windows
            .get(conversation_id)
            .map_or(0, |window| window.by_order.len())
    }

    /// Insert or merge a message, keyed by identity.
    ///
    /// Updating an existing id merges fields in place; the entry only moves
    /// when its `created_at` changed, and it keeps its insertion sequence
    /// when it does.
    pub fn upsert_message(&mut self, message: Message) -> UpsertOutcome {
        let window = self
            .windows
            .entry(message.conversation_id.clone())
            .or_default();

        if let Some(&key) = window.by_id.get(&message.id) {
            let existing = &window.by_order[&key];
            if *existing == message {
                return UpsertOutcome::Unchanged;
            }
            if message.created_at == key.0 {
                window.by_order.insert(key, message);
                return UpsertOutcome::Updated { reordered: false };
            }
            window.by_order.remove(&key);
            let new_key = (message.created_at, key.1);
            window.by_id.insert(message.id.clone(), new_key);
            window.by_order.insert(new_key, message);
            return UpsertOutcome::Updated { reordered: true };
        }

        let key = (message.created_at, self.next_seq);
        self.next_seq += 1;
        let at_tail = window
            .by_order
            .last_key_value()
            .map_or(true, |(last, _)| *last < key);
        window.by_id.insert(message.id.clone(), key);
        window.by_order.insert(key, message);
        UpsertOutcome::Inserted { at_tail }
    }

    /// Swap a message's identity, merging the new state in.
    ///
    /// Used when a confirmation resolves a local placeholder to a server id.
    /// The entry keeps its insertion sequence, so a confirmation that also
    /// preserved `created_at` leaves the window order untouched. If the new
    /// identity is already present the placeholder is dropped and the
    /// existing entry updated, leaving a single entry.
    pub fn resolve_message(&mut self, old_id: &MessageId, message: Message) -> UpsertOutcome {
        if *old_id == message.id {
            return self.upsert_message(message);
        }

        let window = self
            .windows
            .entry(message.conversation_id.clone())
            .or_default();

        let old_key = match window.by_id.remove(old_id) {
            Some(key) => key,
            // Placeholder already gone; fall back to a plain merge.
            None => return self.upsert_message(message),
        };
        window.by_order.remove(&old_key);

        if window.by_id.contains_key(&message.id) {
            return self.upsert_message(message);
        }

        let new_key = (message.created_at, old_key.1);
        window.by_id.insert(message.id.clone(), new_key);
        window.by_order.insert(new_key, message);
        UpsertOutcome::Updated {
            reordered: new_key.0 != old_key.0,
        }
    }

    /// Remove a message. Returns the removed entry, if any.
    pub fn remove_message(&mut self, conversation_id: &str, id: &MessageId) -> Option<Message> {
        let window = self.windows.get_mut(conversation_id)?;
        let key = window.by_id.remove(id)?;
        let removed = window.by_order.remove(&key);
        if window.is_empty() {
            self.windows.remove(conversation_id);
        }
        removed
    }

    /// Summary rows ordered by `last_activity_at` descending.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.summaries.values().cloned().collect()
    }

    /// Point lookup of a summary row.
    pub fn summary(&self, conversation_id: &str) -> Option<&ConversationSummary> {
        let key = self.summary_index.get(conversation_id)?;
        self.summaries.get(key)
    }

    /// Number of summary rows.
    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }

    /// Insert or replace a summary row, keeping the list ordered by activity.
    ///
    /// Returns `false` when the write carried no changes.
    pub fn upsert_summary(&mut self, summary: ConversationSummary) -> bool {
        if let Some(old_key) = self.summary_index.get(&summary.id) {
            if self.summaries.get(old_key) == Some(&summary) {
                return false;
            }
            let old_key = old_key.clone();
            self.summaries.remove(&old_key);
        }
        let key = (Reverse(summary.last_activity_at), summary.id.clone());
        self.summary_index.insert(summary.id.clone(), key.clone());
        self.summaries.insert(key, summary);
        true
    }

    /// Remove a summary row. Returns the removed row, if any.
    pub fn remove_summary(&mut self, conversation_id: &str) -> Option<ConversationSummary> {
        let key = self.summary_index.remove(conversation_id)?;
        self.summaries.remove(&key)
    }

    /// Drop a conversation entirely: its summary row and its message window.
    ///
    /// Returns `true` when anything was removed.
    pub fn remove_conversation(&mut self, conversation_id: &str) -> bool {
        let had_summary = self.remove_summary(conversation_id).is_some();
        let had_window = self.windows.remove(conversation_id).is_some();
        had_summary || had_window
    }
}
