//! Notification cadence policy.
//!
//! Reconciliation reports which scopes changed; this module decides how
//! urgently observers hear about it. Message traffic notifies immediately,
//! metadata coalesces within an adaptive window that widens when the network
//! degrades. The async driver lives in the client; everything here is pure.

use crate::ConversationId;
use serde::{Deserialize, Serialize};

/// A notification target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// One conversation's message window
    Conversation(ConversationId),
    /// The conversation summary list
    SummaryList,
}

/// Urgency class of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyClass {
    /// Conversational content; observers are notified immediately
    Message,
    /// Membership and summary churn; coalesced within the adaptive window
    Metadata,
}

impl NotifyClass {
    /// Combine two classes for one scope; message urgency wins.
    pub fn escalate(self, other: NotifyClass) -> NotifyClass {
        if self == NotifyClass::Message || other == NotifyClass::Message {
            NotifyClass::Message
        } else {
            NotifyClass::Metadata
        }
    }
}

/// Observed network condition, sampled by the connection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Fast,
    Slow,
    Offline,
}

/// Coalescing window for metadata notifications.
///
/// Tracks the current window length, narrowing on fast networks and widening
/// on slow or recovering ones. Starts and resets at the slow end, so a burst
/// right after (re)connecting is absorbed instead of replayed tick by tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveWindow {
    fast_ms: u64,
    slow_ms: u64,
    current_ms: u64,
}

impl AdaptiveWindow {
    /// Create a window spanning the given bounds, starting at the slow end.
    pub fn new(fast_ms: u64, slow_ms: u64) -> Self {
        Self {
            fast_ms,
            slow_ms,
            current_ms: slow_ms,
        }
    }

    /// Current metadata coalescing window in milliseconds.
    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }

    /// Adjust to an observed network quality sample.
    pub fn observe(&mut self, quality: NetworkQuality) {
        self.current_ms = match quality {
            NetworkQuality::Fast => self.fast_ms,
            NetworkQuality::Slow | NetworkQuality::Offline => self.slow_ms,
        };
    }

    /// Widen back to the slow end after a sustained disconnect.
    pub fn on_disconnect(&mut self) {
        self.current_ms = self.slow_ms;
    }
}
