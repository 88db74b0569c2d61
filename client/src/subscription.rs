//! Scope observer registry.
//!
//! Tracks which callers want to hear about which store scopes and fans
//! fresh snapshots out to them when the session loop says a scope changed.

use std::sync::Arc;

use dashmap::DashMap;
use ripple_engine::{ConversationSummary, Message, Scope};

/// Snapshot delivered to observers on change.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Ordered message window of one conversation
    Conversation(Vec<Message>),
    /// Summary rows, most recent activity first
    Summaries(Vec<ConversationSummary>),
}

/// Callback invoked with a fresh snapshot on every notification.
pub type Observer = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Identifier for one subscription.
pub type SubscriptionId = String;

struct Subscription {
    scope: Scope,
    observer: Observer,
}

/// Manages scope observers.
///
/// Thread-safe and shared between the facade and the session loop via `Arc`.
#[derive(Default)]
pub struct SubscriptionHub {
    /// All subscriptions, keyed by subscription ID.
    subscriptions: DashMap<SubscriptionId, Subscription>,
    /// Index of subscriptions by scope for efficient fan-out.
    by_scope: DashMap<Scope, Vec<SubscriptionId>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            by_scope: DashMap::new(),
        }
    }

    /// Register an observer for a scope.
    ///
    /// Returns the subscription ID.
    pub fn subscribe(&self, scope: Scope, observer: Observer) -> SubscriptionId {
        let subscription_id = uuid::Uuid::new_v4().to_string();

        self.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                scope: scope.clone(),
                observer,
            },
        );
        self.by_scope
            .entry(scope)
            .or_default()
            .push(subscription_id.clone());

        tracing::debug!(subscription_id = %subscription_id, "observer subscribed");

        subscription_id
    }

    /// Remove a subscription. Unknown IDs are a no-op.
    pub fn unsubscribe(&self, subscription_id: &str) {
        if let Some((_, subscription)) = self.subscriptions.remove(subscription_id) {
            if let Some(mut ids) = self.by_scope.get_mut(&subscription.scope) {
                ids.retain(|id| id != subscription_id);
                // Clean up empty entries
                if ids.is_empty() {
                    drop(ids);
                    self.by_scope.remove(&subscription.scope);
                }
            }

            tracing::debug!(subscription_id = %subscription_id, "observer unsubscribed");
        }
    }

    /// Deliver a snapshot to every observer of `scope`.
    ///
    /// Returns the number of observers notified.
    pub fn notify(&self, scope: &Scope, snapshot: Snapshot) -> usize {
        // Collect first: callbacks must run without the map guard held,
        // since a callback may subscribe or unsubscribe.
        let observers: Vec<Observer> = match self.by_scope.get(scope) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| {
                    self.subscriptions
                        .get(id)
                        .map(|subscription| subscription.observer.clone())
                })
                .collect(),
            None => return 0,
        };

        for observer in &observers {
            observer(snapshot.clone());
        }

        tracing::trace!(recipients = observers.len(), "notified scope observers");

        observers.len()
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of distinct scopes with at least one observer.
    pub fn scope_count(&self) -> usize {
        self.by_scope.len()
    }
}
