//! Wraparound-safe monotonic tick arithmetic.
//!
//! The device clock is a 32-bit millisecond counter truncated from the
//! 64-bit `esp_timer` value, so it wraps roughly every 49.7 days.  All
//! elapsed-time math goes through [`MonotonicTick::elapsed_since`], which
//! uses modular subtraction and stays correct across the wrap.

use core::time::Duration;

/// Milliseconds since boot, modulo 2³².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonotonicTick(pub u32);

impl MonotonicTick {
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`.
    ///
    /// Valid as long as the true interval is shorter than one full wrap.
    pub const fn elapsed_since(self, earlier: MonotonicTick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub const fn wrapping_add_millis(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }
}

/// Convert a window to whole milliseconds, saturating at `u32::MAX`.
pub fn duration_to_millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
