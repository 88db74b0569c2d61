//! Error types for the client session layer.

use thiserror::Error;

/// Errors surfaced by the session facade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Engine error: {0}")]
    Engine(#[from] ripple_engine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ClientError::UnknownEntity("msg-9".into());
        assert_eq!(err.to_string(), "Unknown entity: msg-9");

        let err = ClientError::SessionClosed;
        assert_eq!(err.to_string(), "Session closed");

        let err = ClientError::Config("RIPPLE_RETENTION_MS is not a number".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: RIPPLE_RETENTION_MS is not a number"
        );
    }

    #[test]
    fn engine_and_serde_errors_wrap() {
        let err = ClientError::from(ripple_engine::Error::OperationNotFound("op-9".into()));
        assert_eq!(err.to_string(), "Engine error: operation not found: op-9");

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::from(json_err);
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}
