//! Trailing-edge debounce for edit bursts
//!
//! The debouncer holds no timer of its own: callers feed it the current
//! instant, which keeps it usable from any event loop and easy to test.

use std::time::{Duration, Instant};

/// Delay used when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncePolicy {
    /// Quiet period after the last event before firing
    pub delay: Duration,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DEBOUNCE,
        }
    }
}

/// Collapses a burst of events into one firing after the burst goes quiet.
#[derive(Debug, Clone)]
pub struct Debouncer {
    policy: DebouncePolicy,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            last_event: None,
        }
    }

    /// Note an event; restarts the quiet period.
    pub fn record(&mut self, now: Instant) {
        self.last_event = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }

    /// When the pending burst will fire, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_event.map(|t| t + self.policy.delay)
    }

    /// True exactly once per burst, when its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }
}
