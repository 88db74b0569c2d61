//! Transport seams between the session and the application's wire layer.
//!
//! The session owns reconciliation policy but never owns sockets. The push
//! channel and the mutation path are injected behind these traits, so any
//! wire (websocket, SSE, a test script) plugs in without touching session
//! logic.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use ripple_engine::{NetworkQuality, OperationId, OperationKind};
use serde_json::Value;
use thiserror::Error;

/// Raw frames from the push channel; decoding happens at the connection
/// boundary, not in the transport.
pub type EventStream = BoxStream<'static, std::result::Result<Value, TransportError>>;

/// Failure opening or reading the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The live push channel.
pub trait PushTransport: Send + Sync + 'static {
    /// Open the channel, yielding a stream of raw frames.
    ///
    /// Called again after every stream failure; each call is a fresh
    /// connection attempt.
    fn open(&self) -> BoxFuture<'static, std::result::Result<EventStream, TransportError>>;

    /// Current estimate of network quality, sampled around connection
    /// transitions to steer notification cadence.
    fn quality(&self) -> NetworkQuality;
}

/// A mutation on its way out.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    /// Optimistic entity serialized for the wire
    pub payload: Value,
}

/// Server verdict on a dispatched mutation.
///
/// Transport-level failures are reported as `Err` with `retryable: true`;
/// the dispatcher never panics the session.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Accepted; `data` carries the authoritative entity record
    Ok { data: Value },
    /// Rejected
    Err { error: String, retryable: bool },
}

/// The mutation path. An HTTP call, an RPC, a queue; the session does not
/// care, it only routes the outcome back into the ledger.
pub trait MutationDispatcher: Send + Sync + 'static {
    fn dispatch(&self, request: MutationRequest) -> BoxFuture<'static, MutationOutcome>;
}
