//! GPIO / peripheral pin assignments for the PegaVox main board.
//!
//! Single source of truth: [`crate::config::DeviceConfig::default`] and
//! the drivers reference this module rather than hard-coding pin numbers.

use crate::app::ports::LineId;

// ---------------------------------------------------------------------------
// Thermal printer (ESC/POS over UART1)
// ---------------------------------------------------------------------------

/// UART peripheral the printer is wired to.
pub const PRINTER_UART_PORT: i32 = 1;
pub const PRINTER_TX_GPIO: LineId = 17;
pub const PRINTER_RX_GPIO: LineId = 18;
/// Printer factory default baud rate.
pub const PRINTER_BAUD: u32 = 9600;

// ---------------------------------------------------------------------------
// I²C bus (OLED display and future sensors)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: LineId = 41;
pub const I2C_SCL_GPIO: LineId = 42;
/// Fast-mode clock.
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// User button (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button that triggers a print.
pub const BUTTON_GPIO: LineId = 12;
