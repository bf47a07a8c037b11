//! Simulated counter-card gate.
//!
//! All registers on one card count while the gate is open. A master register
//! arms the gate to close when its preselection is reached, and stopping or
//! pausing a master closes or holds the gate for every register on the card.
//! Registers measure time on the gate clock, which only advances while the
//! gate is open and not held.
//!
//! Every method takes the current instant explicitly. Callers pass
//! [`tokio::time::Instant::now`], so tests with a paused runtime clock see
//! exact counts.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct GateState {
    epoch: Instant,
    /// Gate-closed or held time already excluded from the clock
    held: Duration,
    held_since: Option<Instant>,
    closes_at: Option<Instant>,
}

impl GateState {
    fn end(&self, now: Instant) -> Instant {
        self.closes_at.map_or(now, |at| at.min(now))
    }

    fn clock(&self, now: Instant) -> Duration {
        let end = self.end(now);
        let holding = self
            .held_since
            .map_or(Duration::ZERO, |since| end.saturating_duration_since(since));
        end.saturating_duration_since(self.epoch)
            .saturating_sub(self.held + holding)
    }

    fn fold_hold(&mut self, now: Instant) {
        let end = self.end(now);
        if let Some(since) = self.held_since.take() {
            self.held += end.saturating_duration_since(since);
        }
    }
}

/// Gate shared by the registers of one simulated counter card
#[derive(Debug)]
pub struct MockGate {
    state: Mutex<GateState>,
}

impl MockGate {
    /// A new gate, closed clock at zero until the first register opens it.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(GateState {
                epoch: now,
                held: Duration::ZERO,
                held_since: None,
                closes_at: Some(now),
            }),
        }
    }

    /// Gate clock at `now`.
    pub fn clock(&self, now: Instant) -> Duration {
        self.state.lock().clock(now)
    }

    /// Open the gate. A pending close in the future stays armed.
    pub fn open(&self, now: Instant) {
        let mut state = self.state.lock();
        state.fold_hold(now);
        if let Some(at) = state.closes_at {
            if at <= now {
                state.held += now.saturating_duration_since(at);
                state.closes_at = None;
            }
        }
    }

    /// Arm the gate to close `after` from `now`, keeping an earlier close.
    pub fn limit(&self, now: Instant, after: Duration) {
        let Some(at) = now.checked_add(after) else {
            return;
        };
        let mut state = self.state.lock();
        state.closes_at = Some(state.closes_at.map_or(at, |existing| existing.min(at)));
    }

    /// Close the gate at `now` unless it closed earlier.
    pub fn close(&self, now: Instant) {
        let mut state = self.state.lock();
        state.closes_at = Some(state.closes_at.map_or(now, |existing| existing.min(now)));
    }

    /// Freeze the clock until [`release`](Self::release). Drops any armed close.
    pub fn hold(&self, now: Instant) {
        let mut state = self.state.lock();
        if state.held_since.is_some() || state.closes_at.is_some_and(|at| at <= now) {
            return;
        }
        state.held_since = Some(now);
        state.closes_at = None;
    }

    pub fn release(&self, now: Instant) {
        self.state.lock().fold_hold(now);
    }

    pub fn is_closed(&self, now: Instant) -> bool {
        self.state.lock().closes_at.is_some_and(|at| at <= now)
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().held_since.is_some()
    }
}

impl Default for MockGate {
    fn default() -> Self {
        Self::new()
    }
}
