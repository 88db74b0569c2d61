//! Notification cadence for the session loop.
//!
//! Message-class changes notify observers immediately; metadata-class
//! changes are parked and flushed together when the adaptive window
//! elapses. The scheduler only decides which scopes to notify and when to
//! wake up; snapshot fan-out lives in the subscription hub.

use std::collections::HashSet;

use ripple_engine::{AdaptiveWindow, ChangedScope, NetworkQuality, NotifyClass, Scope};
use tokio::time::{Duration, Instant};

pub struct UpdateScheduler {
    window: AdaptiveWindow,
    /// Metadata-class scopes awaiting a coalesced flush
    parked: HashSet<Scope>,
    deadline: Option<Instant>,
}

impl UpdateScheduler {
    pub fn new(fast_ms: u64, slow_ms: u64) -> Self {
        Self {
            window: AdaptiveWindow::new(fast_ms, slow_ms),
            parked: HashSet::new(),
            deadline: None,
        }
    }

    /// Record reconciliation changes, returning the scopes to notify right
    /// away. Metadata scopes are parked until the coalescing deadline.
    pub fn record(&mut self, changes: Vec<ChangedScope>) -> Vec<Scope> {
        let mut immediate = Vec::new();
        for change in changes {
            match change.class {
                NotifyClass::Message => {
                    // The immediate notification covers any parked metadata
                    // change for the same scope.
                    self.parked.remove(&change.scope);
                    immediate.push(change.scope);
                }
                NotifyClass::Metadata => {
                    self.parked.insert(change.scope);
                    if self.deadline.is_none() {
                        self.deadline = Some(
                            Instant::now() + Duration::from_millis(self.window.current_ms()),
                        );
                    }
                }
            }
        }
        if self.parked.is_empty() {
            self.deadline = None;
        }
        immediate
    }

    /// Deadline for the session loop's sleep arm, if anything is parked.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drain the parked scopes once the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<Scope> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.drain(),
            _ => Vec::new(),
        }
    }

    /// Drain everything parked regardless of the deadline.
    pub fn flush(&mut self) -> Vec<Scope> {
        self.drain()
    }

    pub fn observe_quality(&mut self, quality: NetworkQuality) {
        self.window.observe(quality);
    }

    pub fn on_disconnect(&mut self) {
        self.window.on_disconnect();
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    fn drain(&mut self) -> Vec<Scope> {
        self.deadline = None;
        let mut due: Vec<Scope> = self.parked.drain().collect();
        due.sort();
        due
    }
}
