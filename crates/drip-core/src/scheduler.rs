//! Throttled flush timer.
//!
//! Two states: idle, or armed with a single deadline. The session waits on
//! that deadline alongside worker output, so at most one flush is ever
//! outstanding and arming an armed scheduler is a no-op.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Armed { deadline: Instant },
}

#[derive(Debug)]
pub struct FlushScheduler {
    interval: Duration,
    state: FlushState,
    last_flush: Option<Instant>,
    fired: u64,
}

impl FlushScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: FlushState::Idle,
            last_flush: None,
            fired: 0,
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, FlushState::Armed { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            FlushState::Armed { deadline } => Some(deadline),
            FlushState::Idle => None,
        }
    }

    /// Idle → Armed, firing one interval from `now`. Returns false if a
    /// flush was already armed; the existing deadline is kept.
    pub fn arm(&mut self, now: Instant) -> bool {
        match self.state {
            FlushState::Armed { .. } => false,
            FlushState::Idle => {
                self.state = FlushState::Armed {
                    deadline: now + self.interval,
                };
                true
            }
        }
    }

    /// The armed deadline has been reached: Armed → Idle.
    ///
    /// Returns false (and does nothing) if no flush was armed.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.state = FlushState::Idle;
        self.last_flush = Some(now);
        self.fired += 1;
        true
    }

    /// Cancel an outstanding flush. Returns true if one was armed.
    pub fn revoke(&mut self) -> bool {
        let was_armed = self.is_armed();
        self.state = FlushState::Idle;
        was_armed
    }

    /// When the last flush fired.
    pub fn last_flush(&self) -> Option<Instant> {
        self.last_flush
    }

    /// How many flushes have fired.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}
