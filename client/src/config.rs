//! Session configuration.

use std::env;
use std::str::FromStr;

use ripple_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Tuning for one client session: engine thresholds plus connection and
/// scheduling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Reconciliation thresholds shared with the engine
    pub engine: EngineConfig,
    /// Delay before the first reconnect attempt (milliseconds)
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on the reconnect delay (milliseconds)
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failures before the connection parks in an error state
    pub max_reconnect_attempts: u32,
    /// How often the session loop purges expired ledger entries (milliseconds)
    pub ledger_purge_interval_ms: u64,
    /// Capacity of the decoded push-event queue
    pub event_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 15_000,
            max_reconnect_attempts: 10,
            ledger_purge_interval_ms: 30_000,
            event_queue_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Load configuration from `RIPPLE_`-prefixed environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            engine: EngineConfig {
                coalesce_window_ms: env_or(
                    "RIPPLE_COALESCE_WINDOW_MS",
                    defaults.engine.coalesce_window_ms,
                )?,
                ledger_retention_ms: env_or(
                    "RIPPLE_LEDGER_RETENTION_MS",
                    defaults.engine.ledger_retention_ms,
                )?,
                notify_window_fast_ms: env_or(
                    "RIPPLE_NOTIFY_WINDOW_FAST_MS",
                    defaults.engine.notify_window_fast_ms,
                )?,
                notify_window_slow_ms: env_or(
                    "RIPPLE_NOTIFY_WINDOW_SLOW_MS",
                    defaults.engine.notify_window_slow_ms,
                )?,
            },
            reconnect_base_delay_ms: env_or(
                "RIPPLE_RECONNECT_BASE_DELAY_MS",
                defaults.reconnect_base_delay_ms,
            )?,
            reconnect_max_delay_ms: env_or(
                "RIPPLE_RECONNECT_MAX_DELAY_MS",
                defaults.reconnect_max_delay_ms,
            )?,
            max_reconnect_attempts: env_or(
                "RIPPLE_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            )?,
            ledger_purge_interval_ms: env_or(
                "RIPPLE_LEDGER_PURGE_INTERVAL_MS",
                defaults.ledger_purge_interval_ms,
            )?,
            event_queue_capacity: env_or(
                "RIPPLE_EVENT_QUEUE_CAPACITY",
                defaults.event_queue_capacity,
            )?,
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::Config(format!("invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
