//! Port traits: the boundary between the firmware core and the hardware.
//!
//! ```text
//!   Driver ──▶ Port trait ──▶ InputEventPipeline / BusRecoveryController
//! ```
//!
//! The ESP-IDF drivers in [`crate::drivers`] implement these traits on the
//! device; the integration tests implement them with in-memory mocks.
//! The core never touches a register directly.

use core::fmt;

use crate::bus::BusConfig;
use crate::input::EdgeProducer;
use crate::time::MonotonicTick;

use super::events::AppEvent;

/// GPIO number, as used by ESP-IDF (`gpio_num_t`).
pub type LineId = i32;

// ───────────────────────────────────────────────────────────────
// Digital line control
// ───────────────────────────────────────────────────────────────

/// Logical level of a digital line at a sampling instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    Low,
    High,
}

impl LineLevel {
    pub const fn from_bool(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
    /// Drives low, floats high (external or bus pull-up sets the level).
    OutputOpenDrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Which transitions raise an edge interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolarity {
    Disabled,
    Falling,
    Rising,
    Any,
}

/// Full electrical configuration of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub direction: Direction,
    pub pull: Pull,
    pub interrupt: EdgePolarity,
}

impl LineConfig {
    /// Interrupt-capable input.
    pub const fn edge_input(pull: Pull, interrupt: EdgePolarity) -> Self {
        Self { direction: Direction::Input, pull, interrupt }
    }

    /// Open-drain output with no internal pull, used to bit-bang a bus line.
    pub const fn open_drain_output() -> Self {
        Self {
            direction: Direction::OutputOpenDrain,
            pull: Pull::None,
            interrupt: EdgePolarity::Disabled,
        }
    }
}

/// Configure, sample and drive individual GPIO lines.
pub trait LinePort {
    /// Apply `config` to `line`.  Fails if the line id is invalid or the
    /// peripheral cannot honour the configuration.
    fn configure_line(&mut self, line: LineId, config: LineConfig) -> Result<(), PortError>;

    /// Sample the current level of `line`.
    fn read_level(&self, line: LineId) -> LineLevel;

    /// Drive `line` to `level`.  The line must have been configured as an output.
    fn write_level(&mut self, line: LineId, level: LineLevel) -> Result<(), PortError>;
}

// ───────────────────────────────────────────────────────────────
// Interrupt registration
// ───────────────────────────────────────────────────────────────

/// Attach per-line edge handlers.
///
/// The registered [`EdgeProducer`] is invoked from interrupt context.  It
/// only performs a lock-free enqueue; implementations must not wrap it in
/// anything that allocates, blocks or logs.
pub trait EdgeInterruptPort {
    fn register_edge_handler(
        &mut self,
        line: LineId,
        polarity: EdgePolarity,
        producer: EdgeProducer,
    ) -> Result<(), PortError>;

    /// Detach the handler for `line`.  Detaching an unregistered line is a no-op.
    fn unregister_edge_handler(&mut self, line: LineId);
}

// ───────────────────────────────────────────────────────────────
// Two-wire bus peripheral
// ───────────────────────────────────────────────────────────────

/// Master-mode I²C peripheral driver.
pub trait TwoWirePort {
    /// Configure the peripheral and install its driver.
    fn install(&mut self, config: &BusConfig) -> Result<(), PortError>;

    /// Delete the driver.  Safe to call when nothing is installed.
    fn uninstall(&mut self);

    /// Address-only write transaction (START, addr|W, STOP).  `Ok` means
    /// the address was ACKed within `timeout_ms`.
    fn probe(&mut self, address: u8, timeout_ms: u32) -> Result<(), PortError>;
}

// ───────────────────────────────────────────────────────────────
// Byte sink / time / events
// ───────────────────────────────────────────────────────────────

/// Raw serial output (printer UART, debug console).
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PortError>;
}

/// Free-running monotonic millisecond counter.
pub trait Clock {
    fn now(&self) -> MonotonicTick;
}

/// Structured [`AppEvent`] output.  Adapters decide where events go.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

/// Errors returned by port implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The line id does not name a usable GPIO.
    InvalidLine(LineId),
    /// The peripheral ran out of a resource (interrupt slot, driver instance, memory).
    ResourceExhausted,
    /// A bus operation was attempted with no driver installed.
    NotInstalled,
    /// The addressed device did not acknowledge.
    Nack,
    /// The transaction did not complete in time.
    Timeout,
    /// Raw `esp_err_t` returned by ESP-IDF.
    Platform(i32),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLine(line) => write!(f, "invalid line {}", line),
            Self::ResourceExhausted => write!(f, "peripheral resources exhausted"),
            Self::NotInstalled => write!(f, "driver not installed"),
            Self::Nack => write!(f, "no acknowledge"),
            Self::Timeout => write!(f, "timed out"),
            Self::Platform(rc) => write!(f, "esp_err_t {}", rc),
        }
    }
}

impl std::error::Error for PortError {}
