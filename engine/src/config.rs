//! Tuning knobs for reconciliation and notification cadence.

use serde::{Deserialize, Serialize};

/// Policy thresholds used across the engine.
///
/// Every threshold is configuration rather than a hard-coded constant, so
/// callers can tune matching tolerance and memory bounds per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Tolerance for deciding that a local write and a push record describe
    /// the same logical event (milliseconds).
    pub coalesce_window_ms: u64,
    /// Age beyond which ledger entries are purged regardless of status
    /// (milliseconds).
    pub ledger_retention_ms: u64,
    /// Metadata notification window on fast networks (milliseconds).
    pub notify_window_fast_ms: u64,
    /// Metadata notification window on slow or recovering networks
    /// (milliseconds).
    pub notify_window_slow_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 2_000,
            ledger_retention_ms: 300_000,
            notify_window_fast_ms: 50,
            notify_window_slow_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = EngineConfig::default();
        assert_eq!(config.coalesce_window_ms, 2_000);
        assert_eq!(config.ledger_retention_ms, 300_000);
        assert_eq!(config.notify_window_fast_ms, 50);
        assert_eq!(config.notify_window_slow_ms, 500);
    }

    #[test]
    fn partial_deserialization_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"coalesceWindowMs": 500}"#).unwrap();
        assert_eq!(config.coalesce_window_ms, 500);
        assert_eq!(config.ledger_retention_ms, 300_000);
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert!(json.contains("coalesceWindowMs"));
        assert!(json.contains("notifyWindowFastMs"));
    }
}
