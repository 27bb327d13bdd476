//! Debouncer
//!
//! Single-shot deferred action, re-armed by every trigger. N triggers that
//! arrive less than `delay` apart fire exactly once, `delay` after the last
//! one. Time is passed in explicitly so the host loop (and tests) own the
//! clock.

use std::time::{Duration, Instant};

/// Default quiescence window before a reload fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer relative to `now`
    pub fn trigger_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Arm (or re-arm) the timer relative to the current time
    pub fn trigger(&mut self) {
        self.trigger_at(Instant::now());
    }

    /// Returns `true` once when the deadline has passed, disarming the timer
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// When the pending action is due, if one is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
