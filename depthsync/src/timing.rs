//! Deferred callbacks on the owning event loop.
//!
//! Debounce and quiet-period detection are expressed as a deadline that is
//! scheduled, rescheduled on new input, or cancelled. The owner polls it with
//! the current time from its loop, so the same code runs under a real timer,
//! an async sleep, or a test clock.

use std::time::{Duration, Instant};

/// A single-shot deadline that can be rescheduled or cancelled.
#[derive(Debug, Clone, Default)]
pub struct DeferredTimer {
    deadline: Option<Instant>,
}

impl DeferredTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the timer to fire `interval` after `now`.
    ///
    /// Any pending deadline is replaced.
    pub fn schedule(&mut self, now: Instant, interval: Duration) {
        self.deadline = Some(now + interval);
    }

    /// Schedule only if nothing is pending.
    pub fn schedule_if_idle(&mut self, now: Instant, interval: Duration) {
        if self.deadline.is_none() {
            self.schedule(now, interval);
        }
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, zero if already due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Consume the deadline if it has passed.
    ///
    /// Returns `true` exactly once per scheduled deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
