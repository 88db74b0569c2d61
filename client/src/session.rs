//! Session facade and the loop behind it.
//!
//! A [`Session`] owns the engine state, the connection task, the update
//! scheduler, and the subscription hub. Local mutations write optimistically
//! into the store before their network dispatch starts; push events and
//! mutation responses converge on the same ledger, which arbitrates races
//! between them.

use std::sync::Arc;

use chrono::Utc;
use ripple_engine::{
    reconcile_batch, Authoritative, CancelOutcome, ChangedScope, ConfirmOutcome, ConfirmSource,
    ConversationId, ConversationRecord, ConversationSummary, EntityStore, FailOutcome,
    LedgerEntry, Message, MessageId, MessageKind, MessageRecord, NotifyClass, OperationId,
    OperationKind, OperationLedger, OperationPayload, OperationStatus, PushEvent, Scope,
};
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState, ConnectionStatus};
use crate::error::{ClientError, Result};
use crate::scheduler::UpdateScheduler;
use crate::subscription::{Observer, Snapshot, SubscriptionHub, SubscriptionId};
use crate::transport::{MutationDispatcher, MutationOutcome, MutationRequest, PushTransport};

/// Store and ledger guarded together; every mutation path locks both.
struct EngineState {
    store: EntityStore,
    ledger: OperationLedger,
}

/// Terminal result of one mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Confirmed,
    Failed { error: String, retryable: bool },
    Cancelled,
}

/// Handle to one in-flight mutation.
pub struct OperationTicket {
    operation_id: OperationId,
    outcome_rx: oneshot::Receiver<OperationResult>,
}

impl OperationTicket {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Wait for the terminal result of this attempt.
    ///
    /// If the push channel confirms the operation before the response does,
    /// this still resolves to [`OperationResult::Confirmed`].
    pub async fn wait(self) -> Result<OperationResult> {
        self.outcome_rx
            .await
            .map_err(|_| ClientError::SessionClosed)
    }
}

enum SessionCmd {
    /// Notification scopes produced outside the loop
    Record(Vec<ChangedScope>),
    /// Force-notify parked metadata scopes
    Flush { done: oneshot::Sender<()> },
    Shutdown { done: oneshot::Sender<()> },
}

/// One client session over an injected transport.
pub struct Session {
    state: Arc<RwLock<EngineState>>,
    hub: Arc<SubscriptionHub>,
    dispatcher: Arc<dyn MutationDispatcher>,
    connection: ConnectionManager,
    command_tx: mpsc::Sender<SessionCmd>,
    loop_task: JoinHandle<()>,
}

impl Session {
    /// Start a session.
    ///
    /// The push channel stays down until [`connect`] is called; optimistic
    /// mutations work either way.
    ///
    /// [`connect`]: Session::connect
    pub fn spawn(
        config: SessionConfig,
        transport: Arc<dyn PushTransport>,
        dispatcher: Arc<dyn MutationDispatcher>,
    ) -> Self {
        let state = Arc::new(RwLock::new(EngineState {
            store: EntityStore::new(),
            ledger: OperationLedger::new(config.engine),
        }));
        let hub = Arc::new(SubscriptionHub::new());
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity);
        let (command_tx, command_rx) = mpsc::channel(32);
        let scheduler = UpdateScheduler::new(
            config.engine.notify_window_fast_ms,
            config.engine.notify_window_slow_ms,
        );
        let purge_interval_ms = config.ledger_purge_interval_ms;
        let connection = ConnectionManager::spawn(config, transport, event_tx);
        let loop_task = tokio::spawn(session_loop(
            state.clone(),
            hub.clone(),
            scheduler,
            event_rx,
            command_rx,
            connection.subscribe_status(),
            purge_interval_ms,
        ));

        tracing::info!("session started");

        Self {
            state,
            hub,
            dispatcher,
            connection,
            command_tx,
            loop_task,
        }
    }

    // ---- mutations ----

    /// Send a message optimistically.
    ///
    /// The optimistic entry is in the store when this returns; dispatch and
    /// confirmation happen on a background task tracked by the ticket.
    pub async fn send_message(
        &self,
        conversation_id: impl Into<ConversationId>,
        author_id: impl Into<String>,
        body: impl Into<String>,
        kind: MessageKind,
    ) -> Result<OperationTicket> {
        let now = now_ms();
        let message = Message::optimistic(
            MessageId::Local(format!("tmp_{}", Uuid::new_v4())),
            conversation_id,
            author_id,
            body,
            kind,
            now,
        );
        self.mutate(
            OperationKind::MessageSend,
            OperationPayload::Message(message),
            now,
        )
        .await
    }

    /// Edit an existing message's body optimistically.
    pub async fn edit_message(
        &self,
        conversation_id: &str,
        id: &MessageId,
        body: impl Into<String>,
    ) -> Result<OperationTicket> {
        let now = now_ms();
        let edited = {
            let state = self.state.read().await;
            let mut message = state
                .store
                .message(conversation_id, id)
                .cloned()
                .ok_or_else(|| {
                    ClientError::UnknownEntity(format!("message {} in {}", id, conversation_id))
                })?;
            message.apply_edit(body, now);
            message
        };
        self.mutate(
            OperationKind::MessageEdit,
            OperationPayload::Message(edited),
            now,
        )
        .await
    }

    /// Create a conversation optimistically.
    ///
    /// Returns the locally minted conversation id together with the ticket;
    /// confirmation may rename the room to a server-assigned id.
    pub async fn create_room(&self) -> Result<(ConversationId, OperationTicket)> {
        let now = now_ms();
        let conversation_id = format!("room_{}", Uuid::new_v4());
        let summary = ConversationSummary::new(conversation_id.clone(), "", now, 1);
        let ticket = self
            .mutate(
                OperationKind::RoomCreate,
                OperationPayload::Conversation(summary),
                now,
            )
            .await?;
        Ok((conversation_id, ticket))
    }

    /// Respond to a conversation invitation.
    ///
    /// Accepting writes the room into the summary list optimistically.
    /// Declining has no optimistic footprint: the request is dispatched and
    /// the authoritative removal, if any, arrives over the push channel.
    pub async fn respond_invitation(
        &self,
        conversation_id: impl Into<ConversationId>,
        accept: bool,
    ) -> Result<OperationTicket> {
        let conversation_id = conversation_id.into();
        let now = now_ms();
        if accept {
            let summary = {
                let state = self.state.read().await;
                state.store.summary(&conversation_id).cloned().unwrap_or_else(|| {
                    ConversationSummary::new(conversation_id.clone(), "", now, 1)
                })
            };
            self.mutate(
                OperationKind::InvitationRespond,
                OperationPayload::Conversation(summary),
                now,
            )
            .await
        } else {
            let payload = serde_json::json!({
                "conversationId": conversation_id,
                "accept": false,
            });
            Ok(self.spawn_dispatch(
                Uuid::new_v4().to_string(),
                OperationKind::InvitationRespond,
                payload,
                false,
            ))
        }
    }

    /// Discard an operation, restoring the store to its pre-operation state.
    ///
    /// A cancel racing a confirmation that already landed reports
    /// [`CancelOutcome::AlreadyResolved`]; the ledger status is the arbiter.
    pub async fn cancel(&self, operation_id: &str) -> CancelOutcome {
        let (outcome, changes) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let (conversation, is_message) = operation_target(state, operation_id);
            let summary_before = conversation_summary(state, &conversation);
            let outcome = state.ledger.cancel(&mut state.store, operation_id);
            let changes = match outcome {
                CancelOutcome::Cancelled => {
                    let summary_now = conversation_summary(state, &conversation);
                    mutation_changes(&conversation, is_message, summary_now != summary_before)
                }
                _ => Vec::new(),
            };
            (outcome, changes)
        };
        self.record(changes).await;
        outcome
    }

    /// Alias of [`cancel`] for discarding failed entries.
    ///
    /// [`cancel`]: Session::cancel
    pub async fn discard(&self, operation_id: &str) -> CancelOutcome {
        self.cancel(operation_id).await
    }

    /// Reissue a failed operation as a fresh attempt under a new id.
    pub async fn retry(&self, operation_id: &str) -> Result<OperationTicket> {
        let now = now_ms();
        let new_id = Uuid::new_v4().to_string();
        let (kind, wire, changes) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let (conversation, is_message) = operation_target(state, operation_id);
            let summary_before = conversation_summary(state, &conversation);
            state
                .ledger
                .reissue(&mut state.store, operation_id, new_id.clone(), now)?;
            let entry = state
                .ledger
                .get(&new_id)
                .ok_or_else(|| ripple_engine::Error::OperationNotFound(new_id.clone()))?;
            let kind = entry.kind;
            let wire = serde_json::to_value(&entry.payload)?;
            let summary_now = conversation_summary(state, &conversation);
            let changes =
                mutation_changes(&conversation, is_message, summary_now != summary_before);
            (kind, wire, changes)
        };
        self.record(changes).await;
        tracing::debug!(
            failed_id = %operation_id,
            operation_id = %new_id,
            "operation reissued"
        );
        Ok(self.spawn_dispatch(new_id, kind, wire, true))
    }

    // ---- reads ----

    /// Ordered message window for a conversation.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.state.read().await.store.messages(conversation_id)
    }

    /// Conversation rows, most recent activity first.
    pub async fn summaries(&self) -> Vec<ConversationSummary> {
        self.state.read().await.store.summaries()
    }

    /// Ledger entry for an operation, if still tracked.
    pub async fn operation(&self, operation_id: &str) -> Option<LedgerEntry> {
        self.state.read().await.ledger.get(operation_id).cloned()
    }

    /// Latest connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Watch stream of connection status changes.
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe_status()
    }

    // ---- observers ----

    /// Observe a scope. The callback runs on the session loop whenever the
    /// scope's snapshot changes; it must not block.
    pub fn subscribe(&self, scope: Scope, observer: Observer) -> SubscriptionId {
        self.hub.subscribe(scope, observer)
    }

    /// Remove a subscription. Unknown IDs are a no-op.
    pub fn unsubscribe(&self, subscription_id: &str) {
        self.hub.unsubscribe(subscription_id);
    }

    /// Notify parked metadata scopes now instead of at the next window.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCmd::Flush { done: done_tx })
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        done_rx.await.map_err(|_| ClientError::SessionClosed)
    }

    // ---- lifecycle ----

    /// Bring the push channel up.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Release the push channel; optimistic mutations keep working.
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    /// Stop the session loop and the connection task.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCmd::Shutdown { done: done_tx })
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
        tracing::info!("session stopped");
    }

    // ---- internals ----

    /// Register the operation, write its optimistic entity, and start the
    /// dispatch task.
    async fn mutate(
        &self,
        kind: OperationKind,
        payload: OperationPayload,
        now: u64,
    ) -> Result<OperationTicket> {
        let operation_id = Uuid::new_v4().to_string();
        let wire = serde_json::to_value(&payload)?;
        let conversation = match &payload {
            OperationPayload::Message(message) => Some(message.conversation_id.clone()),
            OperationPayload::Conversation(summary) => Some(summary.id.clone()),
        };
        let is_message = matches!(payload, OperationPayload::Message(_));

        let changes = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let summary_before = conversation_summary(state, &conversation);
            state
                .ledger
                .begin(&mut state.store, operation_id.clone(), kind, payload, now)?;
            let summary_now = conversation_summary(state, &conversation);
            mutation_changes(&conversation, is_message, summary_now != summary_before)
        };
        self.record(changes).await;

        tracing::debug!(operation_id = %operation_id, kind = ?kind, "mutation issued");

        Ok(self.spawn_dispatch(operation_id, kind, wire, true))
    }

    /// Dispatch a mutation on a background task. When `tracked`, the outcome
    /// routes through the ledger; otherwise it maps straight to the ticket.
    fn spawn_dispatch(
        &self,
        operation_id: OperationId,
        kind: OperationKind,
        payload: serde_json::Value,
        tracked: bool,
    ) -> OperationTicket {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let state = self.state.clone();
        let dispatcher = self.dispatcher.clone();
        let command_tx = self.command_tx.clone();
        let request_id = operation_id.clone();

        tokio::spawn(async move {
            let outcome = dispatcher
                .dispatch(MutationRequest {
                    operation_id: request_id.clone(),
                    kind,
                    payload,
                })
                .await;
            let result = if tracked {
                settle(&state, &command_tx, &request_id, outcome).await
            } else {
                match outcome {
                    MutationOutcome::Ok { .. } => OperationResult::Confirmed,
                    MutationOutcome::Err { error, retryable } => {
                        OperationResult::Failed { error, retryable }
                    }
                }
            };
            let _ = outcome_tx.send(result);
        });

        OperationTicket {
            operation_id,
            outcome_rx,
        }
    }

    async fn record(&self, changes: Vec<ChangedScope>) {
        if !changes.is_empty() {
            let _ = self.command_tx.send(SessionCmd::Record(changes)).await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.loop_task.abort();
    }
}

/// Route a mutation outcome into the ledger and map it to a ticket result.
async fn settle(
    state: &Arc<RwLock<EngineState>>,
    command_tx: &mpsc::Sender<SessionCmd>,
    operation_id: &str,
    outcome: MutationOutcome,
) -> OperationResult {
    let (result, changes) = {
        let mut guard = state.write().await;
        let state = &mut *guard;
        let (conversation, is_message) = match state.ledger.get(operation_id) {
            Some(entry) => (
                entry.conversation_id.clone(),
                matches!(entry.payload, OperationPayload::Message(_)),
            ),
            None => {
                return OperationResult::Failed {
                    error: "operation no longer tracked".into(),
                    retryable: false,
                }
            }
        };
        let summary_before = conversation_summary(state, &conversation);

        match outcome {
            MutationOutcome::Ok { data } => {
                let decoded = if is_message {
                    serde_json::from_value::<MessageRecord>(data).map(Authoritative::Message)
                } else {
                    serde_json::from_value::<ConversationRecord>(data)
                        .map(Authoritative::Conversation)
                };
                match decoded {
                    Ok(authoritative) => {
                        let confirm = state.ledger.confirm(
                            &mut state.store,
                            operation_id,
                            authoritative,
                            ConfirmSource::Response,
                        );
                        match confirm {
                            ConfirmOutcome::Confirmed {
                                summary_changed, ..
                            } => (
                                OperationResult::Confirmed,
                                mutation_changes(&conversation, is_message, summary_changed),
                            ),
                            ConfirmOutcome::AlreadyResolved(status) => {
                                (resolved_result(state, operation_id, status), Vec::new())
                            }
                            ConfirmOutcome::Unknown => (
                                OperationResult::Failed {
                                    error: "operation no longer tracked".into(),
                                    retryable: false,
                                },
                                Vec::new(),
                            ),
                        }
                    }
                    Err(error) => {
                        // The server accepted but the record is unreadable.
                        // Roll back; if the server kept the entity it will
                        // arrive over the push channel as a foreign message.
                        tracing::warn!(
                            operation_id = %operation_id,
                            error = %error,
                            "response data did not decode, rolling back"
                        );
                        let fail = state.ledger.fail(
                            &mut state.store,
                            operation_id,
                            "malformed response data",
                            false,
                        );
                        settle_fail(
                            state,
                            operation_id,
                            fail,
                            &conversation,
                            is_message,
                            summary_before,
                        )
                    }
                }
            }
            MutationOutcome::Err { error, retryable } => {
                let fail = state
                    .ledger
                    .fail(&mut state.store, operation_id, error, retryable);
                settle_fail(
                    state,
                    operation_id,
                    fail,
                    &conversation,
                    is_message,
                    summary_before,
                )
            }
        }
    };

    if !changes.is_empty() {
        let _ = command_tx.send(SessionCmd::Record(changes)).await;
    }
    result
}

fn settle_fail(
    state: &mut EngineState,
    operation_id: &str,
    outcome: FailOutcome,
    conversation: &Option<ConversationId>,
    is_message: bool,
    summary_before: Option<ConversationSummary>,
) -> (OperationResult, Vec<ChangedScope>) {
    match outcome {
        FailOutcome::RolledBack | FailOutcome::KeptForRetry => {
            let summary_now = conversation_summary(state, conversation);
            let (error, retryable) = failure_details(state, operation_id);
            (
                OperationResult::Failed { error, retryable },
                mutation_changes(conversation, is_message, summary_now != summary_before),
            )
        }
        FailOutcome::AlreadyResolved(status) => {
            (resolved_result(state, operation_id, status), Vec::new())
        }
        FailOutcome::Unknown => (
            OperationResult::Failed {
                error: "operation no longer tracked".into(),
                retryable: false,
            },
            Vec::new(),
        ),
    }
}

/// Map an already-settled ledger status to a ticket result.
fn resolved_result(
    state: &EngineState,
    operation_id: &str,
    status: OperationStatus,
) -> OperationResult {
    match status {
        OperationStatus::Confirmed => OperationResult::Confirmed,
        OperationStatus::Cancelled => OperationResult::Cancelled,
        OperationStatus::Failed => {
            let (error, retryable) = failure_details(state, operation_id);
            OperationResult::Failed { error, retryable }
        }
        OperationStatus::Pending => OperationResult::Failed {
            error: "operation still pending".into(),
            retryable: false,
        },
    }
}

fn failure_details(state: &EngineState, operation_id: &str) -> (String, bool) {
    match state.ledger.get(operation_id) {
        Some(entry) => (
            entry
                .error
                .clone()
                .unwrap_or_else(|| "request failed".into()),
            entry.retryable,
        ),
        None => ("request failed".into(), false),
    }
}

fn operation_target(state: &EngineState, operation_id: &str) -> (Option<ConversationId>, bool) {
    match state.ledger.get(operation_id) {
        Some(entry) => (
            entry.conversation_id.clone(),
            matches!(entry.payload, OperationPayload::Message(_)),
        ),
        None => (None, false),
    }
}

fn conversation_summary(
    state: &EngineState,
    conversation: &Option<ConversationId>,
) -> Option<ConversationSummary> {
    conversation
        .as_deref()
        .and_then(|id| state.store.summary(id))
        .cloned()
}

/// Scopes invalidated by a mutation-path store write.
fn mutation_changes(
    conversation: &Option<ConversationId>,
    is_message: bool,
    summary_changed: bool,
) -> Vec<ChangedScope> {
    let mut changes = Vec::new();
    if is_message {
        if let Some(id) = conversation {
            changes.push(ChangedScope {
                scope: Scope::Conversation(id.clone()),
                class: NotifyClass::Message,
            });
        }
    }
    if summary_changed {
        changes.push(ChangedScope {
            scope: Scope::SummaryList,
            class: NotifyClass::Metadata,
        });
    }
    changes
}

/// Local wall clock in milliseconds since the epoch.
fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

async fn session_loop(
    state: Arc<RwLock<EngineState>>,
    hub: Arc<SubscriptionHub>,
    mut scheduler: UpdateScheduler,
    mut event_rx: mpsc::Receiver<PushEvent>,
    mut command_rx: mpsc::Receiver<SessionCmd>,
    mut status_rx: watch::Receiver<ConnectionStatus>,
    purge_interval_ms: u64,
) {
    let mut purge = tokio::time::interval(Duration::from_millis(purge_interval_ms.max(1)));
    purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;
    let mut status_open = true;

    loop {
        tokio::select! {
            event = event_rx.recv(), if events_open => match event {
                Some(first) => {
                    // Drain whatever else is queued so a reconnect backlog
                    // reconciles as one unit.
                    let mut events = vec![first];
                    while let Ok(next) = event_rx.try_recv() {
                        events.push(next);
                    }
                    let changes = {
                        let mut guard = state.write().await;
                        let engine = &mut *guard;
                        let batch =
                            reconcile_batch(&mut engine.store, &mut engine.ledger, events);
                        tracing::debug!(
                            applied = batch.applied,
                            confirmed = batch.confirmed,
                            duplicates = batch.duplicates,
                            ignored = batch.ignored,
                            "reconciled push events"
                        );
                        batch.changes
                    };
                    let immediate = scheduler.record(changes);
                    notify_scopes(&state, &hub, &immediate).await;
                }
                None => events_open = false,
            },
            command = command_rx.recv() => match command {
                Some(SessionCmd::Record(changes)) => {
                    let immediate = scheduler.record(changes);
                    notify_scopes(&state, &hub, &immediate).await;
                }
                Some(SessionCmd::Flush { done }) => {
                    let due = scheduler.flush();
                    notify_scopes(&state, &hub, &due).await;
                    let _ = done.send(());
                }
                Some(SessionCmd::Shutdown { done }) => {
                    let _ = done.send(());
                    break;
                }
                None => break,
            },
            changed = status_rx.changed(), if status_open => match changed {
                Ok(()) => {
                    let status = *status_rx.borrow_and_update();
                    if status.state == ConnectionState::Connected {
                        scheduler.observe_quality(status.quality);
                    } else {
                        scheduler.on_disconnect();
                    }
                }
                Err(_) => status_open = false,
            },
            _ = sleep_until_deadline(scheduler.next_deadline()) => {
                let due = scheduler.take_due(Instant::now());
                notify_scopes(&state, &hub, &due).await;
            },
            _ = purge.tick() => {
                let purged = {
                    let mut guard = state.write().await;
                    guard.ledger.purge_expired(now_ms())
                };
                if purged > 0 {
                    tracing::debug!(purged = purged, "dropped expired ledger entries");
                }
            },
        }
    }

    tracing::debug!("session loop stopped");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Fan fresh snapshots out to every observer of the given scopes.
///
/// Snapshots are collected first so callbacks never run under the state
/// lock.
async fn notify_scopes(state: &Arc<RwLock<EngineState>>, hub: &SubscriptionHub, scopes: &[Scope]) {
    if scopes.is_empty() {
        return;
    }
    let snapshots: Vec<(Scope, Snapshot)> = {
        let guard = state.read().await;
        scopes
            .iter()
            .map(|scope| {
                let snapshot = match scope {
                    Scope::Conversation(id) => Snapshot::Conversation(guard.store.messages(id)),
                    Scope::SummaryList => Snapshot::Summaries(guard.store.summaries()),
                };
                (scope.clone(), snapshot)
            })
            .collect()
    };
    for (scope, snapshot) in snapshots {
        hub.notify(&scope, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_engine::EngineConfig;

    fn empty_state() -> EngineState {
        EngineState {
            store: EntityStore::new(),
            ledger: OperationLedger::new(EngineConfig::default()),
        }
    }

    #[test]
    fn message_changes_carry_both_scopes() {
        let changes = mutation_changes(&Some("conv-1".into()), true, true);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].scope, Scope::Conversation("conv-1".into()));
        assert_eq!(changes[0].class, NotifyClass::Message);
        assert_eq!(changes[1].scope, Scope::SummaryList);
        assert_eq!(changes[1].class, NotifyClass::Metadata);
    }

    #[test]
    fn unchanged_summary_stays_quiet() {
        let changes = mutation_changes(&Some("conv-1".into()), true, false);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].scope, Scope::Conversation("conv-1".into()));
    }

    #[test]
    fn conversation_changes_touch_only_the_summary_list() {
        let changes = mutation_changes(&Some("room-1".into()), false, true);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].scope, Scope::SummaryList);
    }

    #[test]
    fn resolved_statuses_map_to_ticket_results() {
        let state = empty_state();
        assert_eq!(
            resolved_result(&state, "op-1", OperationStatus::Confirmed),
            OperationResult::Confirmed
        );
        assert_eq!(
            resolved_result(&state, "op-1", OperationStatus::Cancelled),
            OperationResult::Cancelled
        );
        assert_eq!(
            resolved_result(&state, "op-1", OperationStatus::Failed),
            OperationResult::Failed {
                error: "request failed".into(),
                retryable: false,
            }
        );
    }
}
