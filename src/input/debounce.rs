//! Time-window debounce decision.
//!
//! Owned by the consumer task alone; the interrupt path never sees it.

use crate::app::ports::LineLevel;
use crate::time::MonotonicTick;

/// What the consumer decided about one dequeued edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Arrived within the window of the last accepted activation.
    Debounced,
    /// Outside the window, but the line was no longer at its active level.
    LevelMismatch,
    /// A genuine activation.
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    /// `None` until the first activation, so the first edge after boot is
    /// never compared against an arbitrary tick value.
    last_accepted: Option<MonotonicTick>,
    window_ms: u32,
}

impl DebounceState {
    pub const fn new(window_ms: u32) -> Self {
        Self { last_accepted: None, window_ms }
    }

    pub const fn window_ms(&self) -> u32 {
        self.window_ms
    }

    pub const fn last_accepted(&self) -> Option<MonotonicTick> {
        self.last_accepted
    }

    /// `true` while `now` is at most `window_ms` after the last activation.
    pub fn is_within_window(&self, now: MonotonicTick) -> bool {
        match self.last_accepted {
            Some(last) => now.elapsed_since(last) <= self.window_ms,
            None => false,
        }
    }

    /// Decide one edge.
    ///
    /// `sample` is only called once the window check has passed, so the
    /// line is read as late as possible.  State changes only on
    /// [`EdgeOutcome::Accepted`].
    pub fn evaluate(
        &mut self,
        now: MonotonicTick,
        active: LineLevel,
        sample: impl FnOnce() -> LineLevel,
    ) -> EdgeOutcome {
        if self.is_within_window(now) {
            return EdgeOutcome::Debounced;
        }
        if sample() != active {
            return EdgeOutcome::LevelMismatch;
        }
        self.last_accepted = Some(now);
        EdgeOutcome::Accepted
    }
}
