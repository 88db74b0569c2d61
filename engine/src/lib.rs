//! # Ripple Engine
//!
//! A deterministic reconciliation engine for optimistic, real-time clients.
//!
//! This crate provides the core logic for a conversation client that shows
//! local writes instantly and folds in server echoes, foreign pushes, and
//! failures afterwards. It handles the operation ledger, entity windows,
//! matching heuristics, and rollback with guaranteed determinism - the same
//! inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of sockets, clocks, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//! - **Portable**: Runs anywhere Rust runs (native, WASM, embedded)
//!
//! ## Core Concepts
//!
//! ### Optimistic operations
//!
//! Local mutations are expressed as ledger operations, not direct edits.
//! [`OperationLedger::begin`] writes the optimistic entity into the store
//! immediately and keeps a rollback snapshot; [`OperationLedger::confirm`],
//! [`OperationLedger::fail`] and [`OperationLedger::cancel`] resolve it later.
//!
//! ### Entity windows
//!
//! The [`EntityStore`] keeps per-conversation message windows ordered by
//! `(created_at, insertion sequence)` and a summary list ordered by recency.
//! Ordering is structural; there is no sort step to forget.
//!
//! ### Reconciliation
//!
//! [`reconcile`] folds one decoded push event into the store, matching it
//! against pending operations first so a server echo confirms the local
//! write in place instead of duplicating it. [`reconcile_batch`] replays a
//! backlog and reports one deduplicated set of changed scopes.
//!
//! ## Quick Start
//!
//! ```rust
//! use ripple_engine::{
//!     reconcile, Decoded, EngineConfig, EntityStore, Message, MessageId, MessageKind,
//!     OperationKind, OperationLedger, OperationPayload, PushEvent, ReconcileOutcome,
//! };
//! use serde_json::json;
//!
//! // 1. Create a store and a ledger
//! let mut store = EntityStore::new();
//! let mut ledger = OperationLedger::new(EngineConfig::default());
//!
//! // 2. Begin an optimistic send; the message is visible immediately
//! let draft = Message::optimistic(
//!     MessageId::Local("tmp_1".into()),
//!     "conv_1",
//!     "alice",
//!     "hello",
//!     MessageKind::Text,
//!     1706745600000,
//! );
//! ledger
//!     .begin(
//!         &mut store,
//!         "op_1".into(),
//!         OperationKind::MessageSend,
//!         OperationPayload::Message(draft),
//!         1706745600000,
//!     )
//!     .unwrap();
//! assert!(store.messages("conv_1")[0].is_pending());
//!
//! // 3. The server echo arrives over the push channel
//! let frame = json!({
//!     "type": "insert",
//!     "entity": "message",
//!     "data": {
//!         "id": "m42",
//!         "conversationId": "conv_1",
//!         "authorId": "alice",
//!         "body": "hello",
//!         "createdAt": 1706745600800u64,
//!     },
//! });
//! let event = match PushEvent::decode(&frame).unwrap() {
//!     Decoded::Event(event) => event,
//!     Decoded::Unknown { .. } => unreachable!(),
//! };
//!
//! // 4. Reconcile; the echo confirms the pending send in place
//! let result = reconcile(&mut store, &mut ledger, event);
//! assert!(matches!(
//!     result.outcome,
//!     ReconcileOutcome::ConfirmedPending { timestamp_preserved: true, .. }
//! ));
//!
//! let messages = store.messages("conv_1");
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].id, MessageId::Server("m42".into()));
//! // The echo landed within the coalesce window, so the local timestamp stays
//! assert_eq!(messages[0].created_at, 1706745600000);
//! ```
//!
//! ## Notification cadence
//!
//! Reconciliation reports changed [`Scope`]s tagged with a [`NotifyClass`].
//! Message changes should reach observers immediately; metadata changes can
//! be coalesced with an [`AdaptiveWindow`]. The async driver for that policy
//! lives in the client crate.

pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod schedule;
pub mod store;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use error::Error;
pub use event::{
    ConversationRecord, Decoded, EntityKind, EventType, MembershipRecord, MessageRecord, PushEvent,
};
pub use ledger::{
    Authoritative, CancelOutcome, ConfirmOutcome, ConfirmSource, FailOutcome, LedgerEntry,
    OperationKind, OperationLedger, OperationPayload, OperationStatus,
};
pub use model::{
    ConversationSummary, DeliveryState, Message, MessageId, MessageKind, PREVIEW_MAX_CHARS,
};
pub use reconcile::{
    reconcile, reconcile_batch, BatchOutcome, ChangedScope, Reconciled, ReconcileOutcome,
};
pub use schedule::{AdaptiveWindow, NetworkQuality, NotifyClass, Scope};
pub use store::{EntityStore, UpsertOutcome};

/// Type aliases for clarity
pub type ConversationId = String;
pub type AuthorId = String;
pub type OperationId = String;
pub type Timestamp = u64;
pub type Seq = u64;
