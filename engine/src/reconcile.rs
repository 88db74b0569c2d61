//! Reconciliation - matching inbound authoritative events against local state.
//!
//! This is the correctness boundary of the engine. For each push event it
//! decides exactly one of four things: the event confirms a pending local
//! operation, updates an entity already present, introduces a genuinely new
//! entity from another actor, or repeats state already applied and is
//! dropped.
//!
//! # Message matching heuristic
//!
//! Applied in order, first match wins:
//!
//! 1. A pending operation already carries the event's identity (an
//!    in-flight edit) - confirm it.
//! 2. Exact identity match against the store - merge fields in place, no
//!    reorder.
//! 3. A pending send matches by conversation, author, and body within the
//!    coalescing window - confirm it, preserving the local timestamp.
//! 4. No match - append in timestamp order; an insertion point before the
//!    tail flags out-of-order delivery.
//!
//! Reconciliation is infallible: decode errors are handled upstream at the
//! connection boundary, and every recognized event resolves deterministically
//! to an outcome.

use crate::event::{ConversationRecord, MembershipRecord, MessageRecord, PushEvent};
use crate::ledger::{
    touch_summary, Authoritative, ConfirmOutcome, ConfirmSource, OperationLedger,
};
use crate::model::{ConversationSummary, DeliveryState, Message, MessageId};
use crate::schedule::{NotifyClass, Scope};
use crate::store::{EntityStore, UpsertOutcome};
use crate::{ConversationId, OperationId};
use std::collections::HashMap;

/// How a single push event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event confirmed a pending local operation
    ConfirmedPending {
        operation_id: OperationId,
        /// Local timestamp kept, so the entry did not move
        timestamp_preserved: bool,
    },
    /// Event updated an entity already in the store
    UpdatedExisting,
    /// Event introduced an entity from another actor
    Appended {
        /// Insertion landed before existing entries
        out_of_order: bool,
    },
    /// Event removed an entity
    Removed,
    /// Event repeated state already applied
    Duplicate,
    /// Recognized event with nothing to apply to
    Ignored,
}

/// A notification target invalidated by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedScope {
    pub scope: Scope,
    pub class: NotifyClass,
}

/// Outcome of reconciling one event: what happened and which scopes changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub outcome: ReconcileOutcome,
    pub changes: Vec<ChangedScope>,
}

impl Reconciled {
    fn noop(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            changes: Vec::new(),
        }
    }
}

/// Aggregated result of applying an event backlog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Events that changed store state
    pub applied: usize,
    /// Subset of `applied` that confirmed pending operations
    pub confirmed: usize,
    /// Events dropped as repeats
    pub duplicates: usize,
    /// Events with nothing to apply to
    pub ignored: usize,
    /// Deduplicated scopes to notify, one entry per scope
    pub changes: Vec<ChangedScope>,
}

/// Apply one push event against the store and ledger.
pub fn reconcile(
    store: &mut EntityStore,
    ledger: &mut OperationLedger,
    event: PushEvent,
) -> Reconciled {
    match event {
        PushEvent::MessageInserted(record) | PushEvent::MessageUpdated(record) => {
            apply_message(store, ledger, record)
        }
        PushEvent::MessageDeleted {
            conversation_id,
            id,
        } => delete_message(store, conversation_id, id),
        PushEvent::ConversationUpserted(record) => apply_conversation(store, ledger, record),
        PushEvent::ConversationDeleted { id } => delete_conversation(store, id),
        PushEvent::MembershipChanged(record) => apply_membership(store, record),
    }
}

/// Apply a backlog of events as one unit.
///
/// Used when reconnecting after an outage: per-event merge logic runs for
/// every entry, but changed scopes are aggregated into a single deduplicated
/// set so observers hear about the burst once instead of N times.
pub fn reconcile_batch(
    store: &mut EntityStore,
    ledger: &mut OperationLedger,
    events: Vec<PushEvent>,
) -> BatchOutcome {
    let mut batch = BatchOutcome::default();
    let mut scopes: HashMap<Scope, NotifyClass> = HashMap::new();

    for event in events {
        let result = reconcile(store, ledger, event);
        match result.outcome {
            ReconcileOutcome::ConfirmedPending { .. } => {
                batch.applied += 1;
                batch.confirmed += 1;
            }
            ReconcileOutcome::UpdatedExisting
            | ReconcileOutcome::Appended { .. }
            | ReconcileOutcome::Removed => batch.applied += 1,
            ReconcileOutcome::Duplicate => batch.duplicates += 1,
            ReconcileOutcome::Ignored => batch.ignored += 1,
        }
        for change in result.changes {
            scopes
                .entry(change.scope)
                .and_modify(|class| *class = class.escalate(change.class))
                .or_insert(change.class);
        }
    }

    batch.changes = scopes
        .into_iter()
        .map(|(scope, class)| ChangedScope { scope, class })
        .collect();
    batch.changes.sort_by(|a, b| a.scope.cmp(&b.scope));
    batch
}

fn apply_message(
    store: &mut EntityStore,
    ledger: &mut OperationLedger,
    record: MessageRecord,
) -> Reconciled {
    let server_id = MessageId::Server(record.id.clone());

    if let Some(operation_id) = ledger.pending_for_message(&server_id) {
        return confirm_message(store, ledger, operation_id, record);
    }

    if let Some(existing) = store.message(&record.conversation_id, &server_id).cloned() {
        return merge_message(store, existing, record);
    }

    if let Some(operation_id) = ledger.find_pending_match(&record) {
        return confirm_message(store, ledger, operation_id, record);
    }

    append_message(store, record)
}

fn confirm_message(
    store: &mut EntityStore,
    ledger: &mut OperationLedger,
    operation_id: OperationId,
    record: MessageRecord,
) -> Reconciled {
    let conversation_id = record.conversation_id.clone();
    match ledger.confirm(
        store,
        &operation_id,
        Authoritative::Message(record),
        ConfirmSource::Realtime,
    ) {
        ConfirmOutcome::Confirmed {
            timestamp_preserved,
            summary_changed,
        } => {
            let mut changes = vec![ChangedScope {
                scope: Scope::Conversation(conversation_id),
                class: NotifyClass::Message,
            }];
            if summary_changed {
                changes.push(ChangedScope {
                    scope: Scope::SummaryList,
                    class: NotifyClass::Metadata,
                });
            }
            Reconciled {
                outcome: ReconcileOutcome::ConfirmedPending {
                    operation_id,
                    timestamp_preserved,
                },
                changes,
            }
        }
        // The lookup raced a resolution; nothing left to apply.
        _ => Reconciled::noop(ReconcileOutcome::Duplicate),
    }
}

fn merge_message(store: &mut EntityStore, existing: Message, record: MessageRecord) -> Reconciled {
    let mut merged = existing.clone();
    merged.body = record.body;
    merged.kind = record.kind;
    merged.edited_at = record.edited_at;
    merged.delivery = DeliveryState::Confirmed;
    // Identity already matched; the entry keeps its confirmed position.

    if merged == existing {
        return Reconciled::noop(ReconcileOutcome::Duplicate);
    }

    store.upsert_message(merged.clone());
    let mut changes = vec![ChangedScope {
        scope: Scope::Conversation(merged.conversation_id.clone()),
        class: NotifyClass::Message,
    }];
    if touch_summary(store, &merged) {
        changes.push(ChangedScope {
            scope: Scope::SummaryList,
            class: NotifyClass::Metadata,
        });
    }
    Reconciled {
        outcome: ReconcileOutcome::UpdatedExisting,
        changes,
    }
}

fn append_message(store: &mut EntityStore, record: MessageRecord) -> Reconciled {
    let message = record.into_message();
    let outcome = store.upsert_message(message.clone());
    let out_of_order = matches!(outcome, UpsertOutcome::Inserted { at_tail: false });

    let mut changes = vec![ChangedScope {
        scope: Scope::Conversation(message.conversation_id.clone()),
        class: NotifyClass::Message,
    }];
    if touch_summary(store, &message) {
        changes.push(ChangedScope {
            scope: Scope::SummaryList,
            class: NotifyClass::Metadata,
        });
    }
    Reconciled {
        outcome: ReconcileOutcome::Appended { out_of_order },
        changes,
    }
}

fn delete_message(store: &mut EntityStore, conversation_id: ConversationId, id: String) -> Reconciled {
    match store.remove_message(&conversation_id, &MessageId::Server(id)) {
        Some(_) => Reconciled {
            outcome: ReconcileOutcome::Removed,
            changes: vec![ChangedScope {
                scope: Scope::Conversation(conversation_id),
                class: NotifyClass::Message,
            }],
        },
        None => Reconciled::noop(ReconcileOutcome::Duplicate),
    }
}

fn apply_conversation(
    store: &mut EntityStore,
    ledger: &mut OperationLedger,
    record: ConversationRecord,
) -> Reconciled {
    if let Some(operation_id) = ledger.pending_for_conversation(&record.id) {
        let outcome = ledger.confirm(
            store,
            &operation_id,
            Authoritative::Conversation(record),
            ConfirmSource::Realtime,
        );
        return match outcome {
            ConfirmOutcome::Confirmed {
                timestamp_preserved,
                summary_changed,
            } => {
                let changes = if summary_changed {
                    vec![ChangedScope {
                        scope: Scope::SummaryList,
                        class: NotifyClass::Metadata,
                    }]
                } else {
                    Vec::new()
                };
                Reconciled {
                    outcome: ReconcileOutcome::ConfirmedPending {
                        operation_id,
                        timestamp_preserved,
                    },
                    changes,
                }
            }
            _ => Reconciled::noop(ReconcileOutcome::Duplicate),
        };
    }

    match store.summary(&record.id).cloned() {
        Some(existing) => {
            let merged = ConversationSummary {
                id: record.id,
                last_message_preview: record
                    .last_message_preview
                    .unwrap_or_else(|| existing.last_message_preview.clone()),
                last_activity_at: record.last_activity_at,
                member_count: record.member_count.unwrap_or(existing.member_count),
            };
            if merged == existing {
                return Reconciled::noop(ReconcileOutcome::Duplicate);
            }
            store.upsert_summary(merged);
            Reconciled {
                outcome: ReconcileOutcome::UpdatedExisting,
                changes: vec![ChangedScope {
                    scope: Scope::SummaryList,
                    class: NotifyClass::Metadata,
                }],
            }
        }
        None => {
            let summary = ConversationSummary {
                id: record.id,
                last_message_preview: record.last_message_preview.unwrap_or_default(),
                last_activity_at: record.last_activity_at,
                // A room always has at least its creator.
                member_count: record.member_count.unwrap_or(1),
            };
            store.upsert_summary(summary);
            Reconciled {
                outcome: ReconcileOutcome::Appended {
                    out_of_order: false,
                },
                changes: vec![ChangedScope {
                    scope: Scope::SummaryList,
                    class: NotifyClass::Metadata,
                }],
            }
        }
    }
}

fn delete_conversation(store: &mut EntityStore, id: ConversationId) -> Reconciled {
    if store.remove_conversation(&id) {
        Reconciled {
            outcome: ReconcileOutcome::Removed,
            changes: vec![
                ChangedScope {
                    scope: Scope::Conversation(id),
                    class: NotifyClass::Message,
                },
                ChangedScope {
                    scope: Scope::SummaryList,
                    class: NotifyClass::Metadata,
                },
            ],
        }
    } else {
        Reconciled::noop(ReconcileOutcome::Duplicate)
    }
}

fn apply_membership(store: &mut EntityStore, record: MembershipRecord) -> Reconciled {
    match store.summary(&record.conversation_id).cloned() {
        Some(mut summary) => {
            if summary.member_count == record.member_count {
                return Reconciled::noop(ReconcileOutcome::Duplicate);
            }
            summary.member_count = record.member_count;
            store.upsert_summary(summary);
            Reconciled {
                outcome: ReconcileOutcome::UpdatedExisting,
                changes: vec![ChangedScope {
                    scope: Scope::SummaryList,
                    class: NotifyClass::Metadata,
                }],
            }
        }
        None => Reconciled::noop(ReconcileOutcome::Ignored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ledger::{OperationKind, OperationPayload, OperationStatus};
    use crate::model::MessageKind;
    use crate::Timestamp;

    fn setup() -> (EntityStore, OperationLedger) {
        (
            EntityStore::new(),
            OperationLedger::new(EngineConfig::default()),
        )
    }

    fn record(id: &str, body: &str, created_at: Timestamp) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            conversation_id: "conv-1".into(),
            author_id: "user-1".into(),
            body: body.into(),
            kind: MessageKind::Text,
            created_at,
            edited_at: None,
        }
    }

    fn send(
        store: &mut EntityStore,
        ledger: &mut OperationLedger,
        op: &str,
        temp: &str,
        body: &str,
        at: Timestamp,
    ) {
        ledger
            .begin(
                store,
                op.into(),
                OperationKind::MessageSend,
                OperationPayload::Message(Message::optimistic(
                    MessageId::Local(temp.into()),
                    "conv-1",
                    "user-1",
                    body,
                    MessageKind::Text,
                    at,
                )),
                at,
            )
            .unwrap();
    }

    #[test]
    fn echo_confirms_pending_send_and_preserves_timestamp() {
        let (mut store, mut ledger) = setup();
        send(&mut store, &mut ledger, "op-1", "tmp-1", "hi", 10_000);

        // The push channel echoes the send 800 ms later.
        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m42", "hi", 10_800)),
        );

        assert_eq!(
            result.outcome,
            ReconcileOutcome::ConfirmedPending {
                operation_id: "op-1".into(),
                timestamp_preserved: true,
            }
        );
        let messages = store.messages("conv-1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::Server("m42".into()));
        assert_eq!(messages[0].created_at, 10_000);
        assert_eq!(messages[0].delivery, DeliveryState::Confirmed);
        assert_eq!(
            ledger.get("op-1").unwrap().status,
            OperationStatus::Confirmed
        );
    }

    #[test]
    fn foreign_message_appends_without_matching() {
        let (mut store, mut ledger) = setup();
        send(&mut store, &mut ledger, "op-1", "tmp-1", "hi", 10_000);

        let mut foreign = record("m7", "hi", 10_100);
        foreign.author_id = "user-2".into();
        let result = reconcile(&mut store, &mut ledger, PushEvent::MessageInserted(foreign));

        assert_eq!(
            result.outcome,
            ReconcileOutcome::Appended {
                out_of_order: false
            }
        );
        assert_eq!(store.message_count("conv-1"), 2);
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn repeated_insert_is_dropped_as_duplicate() {
        let (mut store, mut ledger) = setup();
        let event = PushEvent::MessageInserted(record("m1", "hello", 1000));

        let first = reconcile(&mut store, &mut ledger, event.clone());
        assert_eq!(
            first.outcome,
            ReconcileOutcome::Appended {
                out_of_order: false
            }
        );

        let second = reconcile(&mut store, &mut ledger, event);
        assert_eq!(second.outcome, ReconcileOutcome::Duplicate);
        assert!(second.changes.is_empty());
        assert_eq!(store.message_count("conv-1"), 1);
    }

    #[test]
    fn update_merges_in_place_without_reordering() {
        let (mut store, mut ledger) = setup();
        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "one", 1000)),
        );
        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m2", "two", 2000)),
        );

        // Server reports m1 edited; its created_at in the record drifts but
        // the entry must not move.
        let mut edited = record("m1", "one!", 1004);
        edited.edited_at = Some(5000);
        let result = reconcile(&mut store, &mut ledger, PushEvent::MessageUpdated(edited));

        assert_eq!(result.outcome, ReconcileOutcome::UpdatedExisting);
        let messages = store.messages("conv-1");
        assert_eq!(messages[0].body, "one!");
        assert_eq!(messages[0].created_at, 1000);
        assert_eq!(messages[0].edited_at, Some(5000));
        assert_eq!(messages[1].body, "two");
    }

    #[test]
    fn pending_edit_confirmed_by_exact_id() {
        let (mut store, mut ledger) = setup();
        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "original", 1000)),
        );

        let mut edited = store.messages("conv-1")[0].clone();
        edited.apply_edit("edited", 2000);
        ledger
            .begin(
                &mut store,
                "op-edit".into(),
                OperationKind::MessageEdit,
                OperationPayload::Message(edited),
                2000,
            )
            .unwrap();

        let mut echo = record("m1", "edited", 1000);
        echo.edited_at = Some(2000);
        let result = reconcile(&mut store, &mut ledger, PushEvent::MessageUpdated(echo));

        assert!(matches!(
            result.outcome,
            ReconcileOutcome::ConfirmedPending { .. }
        ));
        assert_eq!(
            ledger.get("op-edit").unwrap().status,
            OperationStatus::Confirmed
        );
        let messages = store.messages("conv-1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "edited");
        assert_eq!(messages[0].delivery, DeliveryState::Confirmed);
    }

    #[test]
    fn out_of_order_insert_is_flagged_and_window_stays_sorted() {
        let (mut store, mut ledger) = setup();
        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m2", "second", 2000)),
        );

        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "first", 1000)),
        );

        assert_eq!(
            result.outcome,
            ReconcileOutcome::Appended { out_of_order: true }
        );
        let bodies: Vec<_> = store
            .messages("conv-1")
            .iter()
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn delete_for_unknown_id_is_duplicate() {
        let (mut store, mut ledger) = setup();
        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageDeleted {
                conversation_id: "conv-1".into(),
                id: "m9".into(),
            },
        );
        assert_eq!(result.outcome, ReconcileOutcome::Duplicate);
    }

    #[test]
    fn conversation_upsert_creates_then_merges() {
        let (mut store, mut ledger) = setup();
        let created = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::ConversationUpserted(ConversationRecord {
                id: "conv-1".into(),
                last_message_preview: Some("hello".into()),
                last_activity_at: 1000,
                member_count: Some(3),
            }),
        );
        assert_eq!(
            created.outcome,
            ReconcileOutcome::Appended {
                out_of_order: false
            }
        );

        // Partial update: preview absent, count bumped.
        let merged = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::ConversationUpserted(ConversationRecord {
                id: "conv-1".into(),
                last_message_preview: None,
                last_activity_at: 2000,
                member_count: Some(4),
            }),
        );
        assert_eq!(merged.outcome, ReconcileOutcome::UpdatedExisting);

        let summary = store.summary("conv-1").unwrap();
        assert_eq!(summary.last_message_preview, "hello");
        assert_eq!(summary.last_activity_at, 2000);
        assert_eq!(summary.member_count, 4);
    }

    #[test]
    fn membership_for_unknown_room_is_ignored() {
        let (mut store, mut ledger) = setup();
        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MembershipChanged(MembershipRecord {
                conversation_id: "conv-9".into(),
                member_count: 5,
            }),
        );
        assert_eq!(result.outcome, ReconcileOutcome::Ignored);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn membership_updates_member_count() {
        let (mut store, mut ledger) = setup();
        store.upsert_summary(ConversationSummary::new("conv-1", "hi", 1000, 3));

        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MembershipChanged(MembershipRecord {
                conversation_id: "conv-1".into(),
                member_count: 4,
            }),
        );

        assert_eq!(result.outcome, ReconcileOutcome::UpdatedExisting);
        assert_eq!(store.summary("conv-1").unwrap().member_count, 4);

        let repeat = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MembershipChanged(MembershipRecord {
                conversation_id: "conv-1".into(),
                member_count: 4,
            }),
        );
        assert_eq!(repeat.outcome, ReconcileOutcome::Duplicate);
    }

    #[test]
    fn conversation_delete_drops_window_and_summary() {
        let (mut store, mut ledger) = setup();
        store.upsert_summary(ConversationSummary::new("conv-1", "hi", 1000, 2));
        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "hi", 1000)),
        );

        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::ConversationDeleted { id: "conv-1".into() },
        );

        assert_eq!(result.outcome, ReconcileOutcome::Removed);
        assert_eq!(result.changes.len(), 2);
        assert!(store.messages("conv-1").is_empty());
        assert!(store.summary("conv-1").is_none());
    }

    #[test]
    fn message_traffic_bumps_existing_summary() {
        let (mut store, mut ledger) = setup();
        store.upsert_summary(ConversationSummary::new("conv-1", "old", 500, 2));

        let result = reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "fresh", 1000)),
        );

        assert_eq!(result.changes.len(), 2);
        let summary = store.summary("conv-1").unwrap();
        assert_eq!(summary.last_message_preview, "fresh");
        assert_eq!(summary.last_activity_at, 1000);
    }

    #[test]
    fn batch_merges_backlog_with_single_change_set() {
        let (mut store, mut ledger) = setup();
        send(&mut store, &mut ledger, "op-1", "tmp-1", "mine", 10_000);

        let mut backlog = Vec::new();
        for i in 0..20 {
            let mut rec = record(&format!("b{i}"), &format!("backlog {i}"), 5000 + i * 10);
            rec.author_id = "user-2".into();
            backlog.push(PushEvent::MessageInserted(rec));
        }
        // The confirmation for the pending send is buried in the backlog.
        backlog.push(PushEvent::MessageInserted(record("m42", "mine", 10_500)));
        // And one duplicate of an earlier entry.
        let mut dup = record("b0", "backlog 0", 5000);
        dup.author_id = "user-2".into();
        backlog.push(PushEvent::MessageInserted(dup));

        let outcome = reconcile_batch(&mut store, &mut ledger, backlog);

        assert_eq!(outcome.applied, 21);
        assert_eq!(outcome.confirmed, 1);
        assert_eq!(outcome.duplicates, 1);
        // One conversation scope, message class; no summary row exists.
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].class, NotifyClass::Message);

        let messages = store.messages("conv-1");
        assert_eq!(messages.len(), 21);
        let mine: Vec<_> = messages.iter().filter(|m| m.body == "mine").collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, MessageId::Server("m42".into()));
        assert_eq!(mine[0].created_at, 10_000);
        for pair in messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn ambiguous_match_resolves_to_oldest_pending() {
        let (mut store, mut ledger) = setup();
        send(&mut store, &mut ledger, "op-a", "tmp-a", "same", 1000);
        send(&mut store, &mut ledger, "op-b", "tmp-b", "same", 1200);

        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m1", "same", 1100)),
        );

        assert_eq!(
            ledger.get("op-a").unwrap().status,
            OperationStatus::Confirmed
        );
        assert_eq!(ledger.get("op-b").unwrap().status, OperationStatus::Pending);

        reconcile(
            &mut store,
            &mut ledger,
            PushEvent::MessageInserted(record("m2", "same", 1300)),
        );
        assert_eq!(
            ledger.get("op-b").unwrap().status,
            OperationStatus::Confirmed
        );
        assert_eq!(store.message_count("conv-1"), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn apply_script(script: &[(bool, u8, u16)]) -> (EntityStore, OperationLedger) {
            let mut store = EntityStore::new();
            let mut ledger = OperationLedger::new(EngineConfig::default());
            for (i, (local, id, ts)) in script.iter().enumerate() {
                let ts = *ts as Timestamp;
                if *local {
                    let _ = ledger.begin(
                        &mut store,
                        format!("op-{i}"),
                        OperationKind::MessageSend,
                        OperationPayload::Message(Message::optimistic(
                            MessageId::Local(format!("tmp-{i}")),
                            "conv-1",
                            format!("user-{}", id % 3),
                            format!("body {}", id % 8),
                            MessageKind::Text,
                            ts,
                        )),
                        ts,
                    );
                } else {
                    reconcile(
                        &mut store,
                        &mut ledger,
                        PushEvent::MessageInserted(MessageRecord {
                            id: format!("m{id}"),
                            conversation_id: "conv-1".into(),
                            author_id: format!("user-{}", id % 3),
                            body: format!("body {}", id % 8),
                            kind: MessageKind::Text,
                            created_at: ts,
                            edited_at: None,
                        }),
                    );
                }
            }
            (store, ledger)
        }

        proptest! {
            #[test]
            fn window_stays_ordered(script in proptest::collection::vec(
                (any::<bool>(), 0u8..16, 0u16..5000), 0..60
            )) {
                let (store, _) = apply_script(&script);
                let messages = store.messages("conv-1");
                for pair in messages.windows(2) {
                    prop_assert!(pair[0].created_at <= pair[1].created_at);
                }
            }

            #[test]
            fn no_duplicate_identities(script in proptest::collection::vec(
                (any::<bool>(), 0u8..16, 0u16..5000), 0..60
            )) {
                let (store, _) = apply_script(&script);
                let messages = store.messages("conv-1");
                let mut ids: Vec<_> = messages.iter().map(|m| m.id.clone()).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), messages.len());
            }

            #[test]
            fn reconciliation_is_deterministic(script in proptest::collection::vec(
                (any::<bool>(), 0u8..16, 0u16..5000), 0..40
            )) {
                let (store_a, _) = apply_script(&script);
                let (store_b, _) = apply_script(&script);
                prop_assert_eq!(store_a.messages("conv-1"), store_b.messages("conv-1"));
                prop_assert_eq!(store_a.summaries(), store_b.summaries());
            }

            #[test]
            fn replaying_events_is_idempotent(script in proptest::collection::vec(
                (0u8..16, 0u16..5000), 1..30
            )) {
                let events: Vec<PushEvent> = script
                    .iter()
                    .map(|(id, ts)| {
                        PushEvent::MessageInserted(MessageRecord {
                            id: format!("m{id}"),
                            conversation_id: "conv-1".into(),
                            author_id: "user-1".into(),
                            body: format!("body {id}"),
                            kind: MessageKind::Text,
                            created_at: *ts as Timestamp,
                            edited_at: None,
                        })
                    })
                    .collect();

                let mut store = EntityStore::new();
                let mut ledger = OperationLedger::new(EngineConfig::default());
                reconcile_batch(&mut store, &mut ledger, events.clone());
                let once = store.messages("conv-1");

                reconcile_batch(&mut store, &mut ledger, events);
                prop_assert_eq!(store.messages("conv-1"), once);
            }
        }
    }
}
