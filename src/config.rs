//! Device configuration parameters
//!
//! All tunable parameters for the PegaVox board.  Defaults come from the
//! pin map in [`crate::pins`]; a JSON override can be baked in at build
//! time (see `main.rs`).

use serde::{Deserialize, Serialize};

use crate::app::ports::LineId;
use crate::bus::{BusConfig, MAX_FREQUENCY_HZ};
use crate::error::{Error, Result};
use crate::pins;

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub button: ButtonConfig,
    pub bus: BusConfig,
    pub printer: PrinterConfig,
    pub consumer_task: TaskConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub line: LineId,
    /// Minimum spacing between accepted presses (milliseconds)
    pub debounce_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub uart_port: i32,
    pub tx_line: LineId,
    pub rx_line: LineId,
    pub baud: u32,
}

/// FreeRTOS parameters for the button consumer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub priority: u8,
    pub stack_kb: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            button: ButtonConfig {
                line: pins::BUTTON_GPIO,
                debounce_ms: 50,
            },
            bus: BusConfig::new(pins::I2C_SCL_GPIO, pins::I2C_SDA_GPIO, pins::I2C_FREQ_HZ),
            printer: PrinterConfig {
                uart_port: pins::PRINTER_UART_PORT,
                tx_line: pins::PRINTER_TX_GPIO,
                rx_line: pins::PRINTER_RX_GPIO,
                baud: pins::PRINTER_BAUD,
            },
            // The print callback runs on this task.
            consumer_task: TaskConfig {
                priority: 10,
                stack_kb: 4,
            },
        }
    }
}

impl DeviceConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a subsystem unusable.
    pub fn validate(&self) -> Result<()> {
        if self.button.debounce_ms == 0 {
            return Err(Error::Config("button.debounce_ms must be > 0"));
        }
        if self.button.line < 0 {
            return Err(Error::Config("button.line must be a GPIO number"));
        }
        if self.bus.frequency_hz == 0 || self.bus.frequency_hz > MAX_FREQUENCY_HZ {
            return Err(Error::Config("bus.frequency_hz out of range"));
        }
        if self.bus.clock_line == self.bus.data_line {
            return Err(Error::Config("bus SCL and SDA must differ"));
        }
        if self.printer.baud == 0 {
            return Err(Error::Config("printer.baud must be > 0"));
        }
        if self.consumer_task.stack_kb == 0 {
            return Err(Error::Config("consumer_task.stack_kb must be > 0"));
        }
        Ok(())
    }
}
