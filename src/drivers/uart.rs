//! UART byte sink for the thermal printer.
//!
//! 8N1, no flow control, TX-only in practice (RX is wired but unused).
//! On host builds the bytes are logged instead.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{debug, info};

use crate::app::ports::{ByteSink, PortError};
use crate::config::PrinterConfig;

#[cfg(target_os = "espidf")]
const RX_BUFFER_BYTES: i32 = 1024;
#[cfg(target_os = "espidf")]
const TX_BUFFER_BYTES: i32 = 1024;

pub struct UartSink {
    port: i32,
}

impl UartSink {
    /// Install the UART driver and route it to the configured pins.
    #[cfg(target_os = "espidf")]
    pub fn open(config: &PrinterConfig) -> Result<Self, PortError> {
        let uart_cfg = uart_config_t {
            baud_rate: config.baud as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };

        // SAFETY: driver install / param / pin calls on a caller-chosen port;
        // ESP-IDF validates the port and pin numbers.
        unsafe {
            check(uart_driver_install(
                config.uart_port,
                RX_BUFFER_BYTES,
                TX_BUFFER_BYTES,
                0,
                core::ptr::null_mut(),
                0,
            ))?;
            let configured = check(uart_param_config(config.uart_port, &uart_cfg)).and_then(|()| {
                check(uart_set_pin(
                    config.uart_port,
                    config.tx_line,
                    config.rx_line,
                    UART_PIN_NO_CHANGE,
                    UART_PIN_NO_CHANGE,
                ))
            });
            if let Err(e) = configured {
                uart_driver_delete(config.uart_port);
                return Err(e);
            }
        }

        info!(
            "uart{}: printer link TX={} RX={} @ {} baud",
            config.uart_port, config.tx_line, config.rx_line, config.baud
        );
        Ok(Self { port: config.uart_port })
    }

    /// Simulation fallback, nothing to install.
    #[cfg(not(target_os = "espidf"))]
    pub fn open(config: &PrinterConfig) -> Result<Self, PortError> {
        info!("uart{} (sim): printer link @ {} baud", config.uart_port, config.baud);
        Ok(Self { port: config.uart_port })
    }
}

impl ByteSink for UartSink {
    #[cfg(target_os = "espidf")]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PortError> {
        // SAFETY: `bytes` is valid for `len` bytes for the duration of the
        // call; the driver copies into its TX ring buffer.
        let written = unsafe { uart_write_bytes(self.port, bytes.as_ptr().cast(), bytes.len()) };
        if written < 0 {
            return Err(PortError::Platform(written));
        }
        debug!("uart{}: {} byte(s) queued", self.port, written);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PortError> {
        debug!("uart{} (sim): {:?}", self.port, String::from_utf8_lossy(bytes));
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl Drop for UartSink {
    fn drop(&mut self) {
        // SAFETY: the driver was installed by `open`.
        unsafe { uart_driver_delete(self.port) };
    }
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), PortError> {
    match ret {
        r if r == ESP_OK as i32 => Ok(()),
        r if r == ESP_ERR_NO_MEM as i32 => Err(PortError::ResourceExhausted),
        r => Err(PortError::Platform(r)),
    }
}
