//! # Ripple Client
//!
//! Session layer that drives [`ripple_engine`] over injected transports.
//!
//! The engine decides how optimistic state converges; this crate supplies
//! everything around it:
//!
//! - [`Session`] - the facade callers hold: optimistic mutations, reads,
//!   subscriptions, lifecycle
//! - [`ConnectionManager`] - owns the push channel, reconnects with
//!   exponential backoff, decodes raw frames at the boundary
//! - [`UpdateScheduler`] - notification cadence: message traffic notifies
//!   immediately, metadata churn is coalesced over an adaptive window
//! - [`SubscriptionHub`] - per-scope observer registry fed with fresh
//!   snapshots by the session loop
//!
//! ## Flow
//!
//! Local actions go through [`Session`]: the optimistic write lands in the
//! store before the network dispatch starts, and the returned
//! [`OperationTicket`] resolves when the attempt settles. Push events flow
//! from the transport through the connection task into the session loop,
//! where they reconcile against the ledger; a push echo and a mutation
//! response racing for the same operation are arbitrated by ledger status,
//! whichever lands first wins.
//!
//! The wire itself is injected: implement [`PushTransport`] for the event
//! channel and [`MutationDispatcher`] for the mutation path, and the session
//! stays agnostic of sockets, URLs, and retry semantics below it.

pub mod config;
pub mod connection;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod subscription;
pub mod transport;

pub use ripple_engine as engine;

pub use config::SessionConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use error::{ClientError, Result};
pub use scheduler::UpdateScheduler;
pub use session::{OperationResult, OperationTicket, Session};
pub use subscription::{Observer, Snapshot, SubscriptionHub, SubscriptionId};
pub use transport::{
    EventStream, MutationDispatcher, MutationOutcome, MutationRequest, PushTransport,
    TransportError,
};
