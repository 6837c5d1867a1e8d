//! ESP32 time adapter.
//!
//! Implements [`Clock`] for the debounce pipeline and
//! [`DelayNs`](embedded_hal::delay::DelayNs) for the bus recovery timing.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation.
//!
//! Either way the result is truncated to a 32-bit millisecond tick that
//! wraps; consumers compare ticks with [`MonotonicTick::elapsed_since`].

use embedded_hal::delay::DelayNs;

use crate::app::ports::Clock;
use crate::time::MonotonicTick;

/// Time adapter for the ESP32-S3 platform.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer_get_time reads a free-running hardware counter;
        // callable from any task.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since the adapter was created (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for SystemClock {
    fn now(&self) -> MonotonicTick {
        MonotonicTick((self.uptime_us() / 1000) as u32)
    }
}

/// Blocking delay that yields the calling task.
///
/// On ESP-IDF this is a FreeRTOS tick delay, so sub-tick requests round up
/// to one tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskDelay;

impl DelayNs for TaskDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }

    #[cfg(target_os = "espidf")]
    fn delay_us(&mut self, us: u32) {
        self.delay_ms(us.div_ceil(1_000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
