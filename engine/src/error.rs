//! Error types for the Ripple engine.

use crate::OperationId;
use thiserror::Error;

/// All possible errors from the Ripple engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Ledger errors
    #[error("operation already registered: {0}")]
    DuplicateOperation(OperationId),

    #[error("operation not found: {0}")]
    OperationNotFound(OperationId),

    #[error("operation is not retryable: {0}")]
    NotRetryable(OperationId),

    // Decode errors
    #[error("malformed push event: {0}")]
    MalformedEvent(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
