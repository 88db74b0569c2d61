//! Operation ledger - bookkeeping for in-flight optimistic mutations.
//!
//! Every local mutation attempt gets exactly one ledger entry. The entry
//! carries the optimistic payload, a rollback snapshot of whatever state the
//! write overwrote, and a lifecycle status. Confirm, fail, and cancel are
//! idempotent: resolving an already-resolved or unknown operation is a
//! reported no-op, never an error, because the push channel may deliver
//! duplicates.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{ConversationRecord, MessageRecord};
use crate::model::{ConversationSummary, DeliveryState, Message, MessageId};
use crate::store::EntityStore;
use crate::{ConversationId, OperationId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of local mutation an operation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    MessageSend,
    MessageEdit,
    RoomCreate,
    InvitationRespond,
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Issued, awaiting confirmation
    Pending,
    /// Acknowledged by the server
    Confirmed,
    /// Rejected by the server
    Failed,
    /// Discarded locally
    Cancelled,
}

/// Which channel delivered the authoritative data for a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmSource {
    /// The push channel echoed the change
    Realtime,
    /// The mutation request returned it directly
    Response,
}

/// The optimistic entity an operation wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum OperationPayload {
    Message(Message),
    Conversation(ConversationSummary),
}

/// Authoritative entity data accepted by [`OperationLedger::confirm`].
#[derive(Debug, Clone, PartialEq)]
pub enum Authoritative {
    Message(MessageRecord),
    Conversation(ConversationRecord),
}

/// Entity state captured before an optimistic write, restored on rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSnapshot {
    /// Message entry the operation overwrote, if any
    pub prior_message: Option<Message>,
    /// Summary row as it stood before the operation, if one existed
    pub prior_summary: Option<ConversationSummary>,
}

/// A tracked mutation attempt and everything needed to confirm or undo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Local wall-clock time the attempt was issued
    pub created_at_local: Timestamp,
    pub conversation_id: Option<ConversationId>,
    pub payload: OperationPayload,
    pub rollback: RollbackSnapshot,
    /// Server-reported failure, set once status is failed
    pub error: Option<String>,
    /// Whether a failed attempt may be reissued
    pub retryable: bool,
}

/// Result of a confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Entity replaced with authoritative data
    Confirmed {
        /// Local timestamp kept to avoid visual reordering
        timestamp_preserved: bool,
        /// The conversation's summary row changed as part of the confirm
        summary_changed: bool,
    },
    /// Operation had already left the pending state
    AlreadyResolved(OperationStatus),
    /// No entry with that id
    Unknown,
}

/// Result of a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Entity rolled back and removed from view
    RolledBack,
    /// Entity kept visible, flagged failed
    KeptForRetry,
    /// Operation had already left the pending state
    AlreadyResolved(OperationStatus),
    /// No entry with that id
    Unknown,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Entity rolled back and the entry marked cancelled
    Cancelled,
    /// Operation was already confirmed or cancelled
    AlreadyResolved(OperationStatus),
    /// No entry with that id
    Unknown,
}

/// Tracks every in-flight optimistic mutation for one session.
#[derive(Debug)]
pub struct OperationLedger {
    config: EngineConfig,
    entries: HashMap<OperationId, LedgerEntry>,
}

impl OperationLedger {
    /// Create an empty ledger.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Register a pending operation and write its optimistic entity into the
    /// store immediately.
    ///
    /// Message payloads are forced to [`DeliveryState::Pending`] and fold
    /// into an existing summary row; conversation payloads become a summary
    /// row directly. The rollback snapshot captures whatever the write is
    /// about to overwrite. Errors only on a duplicate `operation_id`.
    pub fn begin(
        &mut self,
        store: &mut EntityStore,
        operation_id: OperationId,
        kind: OperationKind,
        payload: OperationPayload,
        now: Timestamp,
    ) -> Result<OperationId> {
        if self.entries.contains_key(&operation_id) {
            return Err(Error::DuplicateOperation(operation_id));
        }

        let (conversation_id, rollback, payload) = match payload {
            OperationPayload::Message(mut message) => {
                message.delivery = DeliveryState::Pending;
                let rollback = RollbackSnapshot {
                    prior_message: store
                        .message(&message.conversation_id, &message.id)
                        .cloned(),
                    prior_summary: store.summary(&message.conversation_id).cloned(),
                };
                store.upsert_message(message.clone());
                touch_summary(store, &message);
                (
                    Some(message.conversation_id.clone()),
                    rollback,
                    OperationPayload::Message(message),
                )
            }
            OperationPayload::Conversation(summary) => {
                let rollback = RollbackSnapshot {
                    prior_message: None,
                    prior_summary: store.summary(&summary.id).cloned(),
                };
                store.upsert_summary(summary.clone());
                (
                    Some(summary.id.clone()),
                    rollback,
                    OperationPayload::Conversation(summary),
                )
            }
        };

        let entry = LedgerEntry {
            operation_id: operation_id.clone(),
            kind,
            status: OperationStatus::Pending,
            created_at_local: now,
            conversation_id,
            payload,
            rollback,
            error: None,
            retryable: false,
        };
        self.entries.insert(operation_id.clone(), entry);
        Ok(operation_id)
    }

    /// Mark an operation confirmed and replace its optimistic entity with
    /// authoritative data.
    ///
    /// When the push channel is the confirming source and the authoritative
    /// timestamp is within the coalescing window of the optimistic one, the
    /// local timestamp (and with it the window position) is preserved so the
    /// entry does not visibly jump.
    pub fn confirm(
        &mut self,
        store: &mut EntityStore,
        operation_id: &str,
        data: Authoritative,
        source: ConfirmSource,
    ) -> ConfirmOutcome {
        let entry = match self.entries.get_mut(operation_id) {
            Some(entry) => entry,
            None => return ConfirmOutcome::Unknown,
        };
        if entry.status != OperationStatus::Pending {
            return ConfirmOutcome::AlreadyResolved(entry.status);
        }

        match (&entry.payload, data) {
            (OperationPayload::Message(optimistic), Authoritative::Message(record)) => {
                let delta = record.created_at.abs_diff(optimistic.created_at);
                let preserve =
                    source == ConfirmSource::Realtime && delta < self.config.coalesce_window_ms;
                let old_id = optimistic.id.clone();
                let mut confirmed = record.into_message();
                if preserve {
                    confirmed.created_at = optimistic.created_at;
                }
                store.resolve_message(&old_id, confirmed.clone());
                let summary_changed = touch_summary(store, &confirmed);
                entry.status = OperationStatus::Confirmed;
                entry.payload = OperationPayload::Message(confirmed);
                ConfirmOutcome::Confirmed {
                    timestamp_preserved: preserve,
                    summary_changed,
                }
            }
            (OperationPayload::Conversation(optimistic), Authoritative::Conversation(record)) => {
                let preserve = source == ConfirmSource::Realtime
                    && record.last_activity_at.abs_diff(optimistic.last_activity_at)
                        < self.config.coalesce_window_ms;
                let confirmed = ConversationSummary {
                    id: record.id,
                    last_message_preview: record
                        .last_message_preview
                        .unwrap_or_else(|| optimistic.last_message_preview.clone()),
                    last_activity_at: if preserve {
                        optimistic.last_activity_at
                    } else {
                        record.last_activity_at
                    },
                    member_count: record.member_count.unwrap_or(optimistic.member_count),
                };
                // The server may have minted its own id for the room.
                let removed_draft = if confirmed.id != optimistic.id {
                    store.remove_summary(&optimistic.id).is_some()
                } else {
                    false
                };
                let summary_changed = store.upsert_summary(confirmed.clone()) || removed_draft;
                entry.status = OperationStatus::Confirmed;
                entry.payload = OperationPayload::Conversation(confirmed);
                ConfirmOutcome::Confirmed {
                    timestamp_preserved: preserve,
                    summary_changed,
                }
            }
            // Payload and data kinds disagree; leave the entry pending.
            _ => ConfirmOutcome::Unknown,
        }
    }

    /// Mark an operation failed.
    ///
    /// Non-retryable failures roll the store back to the snapshot; retryable
    /// ones keep the entity visible flagged [`DeliveryState::Failed`] so the
    /// caller can offer retry or discard.
    pub fn fail(
        &mut self,
        store: &mut EntityStore,
        operation_id: &str,
        error: impl Into<String>,
        retryable: bool,
    ) -> FailOutcome {
        let entry = match self.entries.get_mut(operation_id) {
            Some(entry) => entry,
            None => return FailOutcome::Unknown,
        };
        if entry.status != OperationStatus::Pending {
            return FailOutcome::AlreadyResolved(entry.status);
        }

        entry.status = OperationStatus::Failed;
        entry.error = Some(error.into());
        entry.retryable = retryable;

        if retryable {
            if let OperationPayload::Message(message) = &mut entry.payload {
                message.delivery = DeliveryState::Failed;
                store.upsert_message(message.clone());
            }
            FailOutcome::KeptForRetry
        } else {
            restore_snapshot(store, entry);
            FailOutcome::RolledBack
        }
    }

    /// Discard an operation, reverting the store to the rollback snapshot.
    ///
    /// Applies to pending and failed entries; a cancel racing a confirmation
    /// that already landed is a no-op, the ledger status is the arbiter.
    pub fn cancel(&mut self, store: &mut EntityStore, operation_id: &str) -> CancelOutcome {
        let entry = match self.entries.get_mut(operation_id) {
            Some(entry) => entry,
            None => return CancelOutcome::Unknown,
        };
        match entry.status {
            OperationStatus::Pending | OperationStatus::Failed => {
                restore_snapshot(store, entry);
                entry.status = OperationStatus::Cancelled;
                CancelOutcome::Cancelled
            }
            status => CancelOutcome::AlreadyResolved(status),
        }
    }

    /// Reissue a kept-visible failed operation as a fresh pending attempt.
    ///
    /// The new attempt inherits the payload under its own operation id; its
    /// rollback snapshot captures the failed entity, so cancelling the retry
    /// restores the failed state rather than losing it.
    pub fn reissue(
        &mut self,
        store: &mut EntityStore,
        failed_id: &str,
        new_operation_id: OperationId,
        now: Timestamp,
    ) -> Result<OperationId> {
        if self.entries.contains_key(&new_operation_id) {
            return Err(Error::DuplicateOperation(new_operation_id));
        }
        let entry = self
            .entries
            .remove(failed_id)
            .ok_or_else(|| Error::OperationNotFound(failed_id.to_string()))?;
        if entry.status != OperationStatus::Failed || !entry.retryable {
            let err = Error::NotRetryable(entry.operation_id.clone());
            self.entries.insert(entry.operation_id.clone(), entry);
            return Err(err);
        }
        self.begin(store, new_operation_id, entry.kind, entry.payload, now)
    }

    /// Oldest pending send whose conversation, author, and body equal the
    /// record's and whose timestamp falls within the coalescing window.
    pub fn find_pending_match(&self, record: &MessageRecord) -> Option<OperationId> {
        let window = self.config.coalesce_window_ms;
        self.entries
            .values()
            .filter(|entry| {
                entry.status == OperationStatus::Pending
                    && entry.kind == OperationKind::MessageSend
            })
            .filter_map(|entry| match &entry.payload {
                OperationPayload::Message(message) => Some((entry, message)),
                _ => None,
            })
            .filter(|(_, message)| {
                message.conversation_id == record.conversation_id
                    && message.author_id == record.author_id
                    && message.body == record.body
                    && message.created_at.abs_diff(record.created_at) < window
            })
            .min_by_key(|(entry, _)| (entry.created_at_local, entry.operation_id.clone()))
            .map(|(entry, _)| entry.operation_id.clone())
    }

    /// Oldest pending operation whose optimistic message carries this
    /// identity. Covers edits and sends whose id is already resolved.
    pub fn pending_for_message(&self, id: &MessageId) -> Option<OperationId> {
        self.entries
            .values()
            .filter(|entry| entry.status == OperationStatus::Pending)
            .filter(|entry| {
                matches!(&entry.payload, OperationPayload::Message(message) if message.id == *id)
            })
            .min_by_key(|entry| (entry.created_at_local, entry.operation_id.clone()))
            .map(|entry| entry.operation_id.clone())
    }

    /// Oldest pending operation whose optimistic summary carries this
    /// conversation id.
    pub fn pending_for_conversation(&self, conversation_id: &str) -> Option<OperationId> {
        self.entries
            .values()
            .filter(|entry| entry.status == OperationStatus::Pending)
            .filter(|entry| {
                matches!(&entry.payload, OperationPayload::Conversation(summary) if summary.id == conversation_id)
            })
            .min_by_key(|entry| (entry.created_at_local, entry.operation_id.clone()))
            .map(|entry| entry.operation_id.clone())
    }

    /// Drop entries older than the retention window, regardless of status.
    /// Returns how many were removed.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let retention = self.config.ledger_retention_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.created_at_local) < retention);
        before - self.entries.len()
    }

    /// Look up an entry by operation id.
    pub fn get(&self, operation_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(operation_id)
    }

    /// Number of entries still pending.
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == OperationStatus::Pending)
            .count()
    }

    /// Total number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger tracks no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold a message into its conversation's summary row, if one exists.
///
/// Summary rows are owned by conversation events; message traffic only
/// updates rows that already exist.
pub(crate) fn touch_summary(store: &mut EntityStore, message: &Message) -> bool {
    let mut updated = match store.summary(&message.conversation_id) {
        Some(current) => current.clone(),
        None => return false,
    };
    if !updated.touch(message) {
        return false;
    }
    store.upsert_summary(updated)
}

fn restore_snapshot(store: &mut EntityStore, entry: &LedgerEntry) {
    match &entry.payload {
        OperationPayload::Message(message) => {
            match &entry.rollback.prior_message {
                Some(prior) => {
                    if prior.id != message.id {
                        store.remove_message(&message.conversation_id, &message.id);
                    }
                    // In-place merge keeps the original window position.
                    store.upsert_message(prior.clone());
                }
                None => {
                    store.remove_message(&message.conversation_id, &message.id);
                }
            }
            // Only rewind the summary while it still reflects this write;
            // newer activity from other actors stays untouched.
            let reflects_op = store
                .summary(&message.conversation_id)
                .map_or(false, |live| {
                    live.last_activity_at == message.created_at
                        && live.last_message_preview == message.preview()
                });
            if reflects_op {
                if let Some(prior) = &entry.rollback.prior_summary {
                    store.upsert_summary(prior.clone());
                }
            }
        }
        OperationPayload::Conversation(summary) => match &entry.rollback.prior_summary {
            Some(prior) => {
                store.upsert_summary(prior.clone());
            }
            None => {
                store.remove_summary(&summary.id);
            }
        },
    }
}
