//! GPIO line driver and per-line edge interrupt registration.
//!
//! ## Interrupt path
//!
//! Uses the ESP-IDF shared GPIO ISR service.  Each registered line gets a
//! boxed [`EdgeProducer`] whose address is passed as the handler argument;
//! the `extern "C"` trampoline turns it back into a reference and calls
//! [`EdgeProducer::signal_edge`].  No global instance state is involved,
//! so two pipelines on two lines stay independent.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: raw `gpio_*` sys calls.
//! On host/test: levels are tracked in memory and registered producers
//! are kept so [`EspGpio::simulate_edge`] can play the role of the ISR.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::{
    Direction, EdgeInterruptPort, EdgePolarity, LineConfig, LineId, LineLevel, LinePort, Pull,
    PortError,
};
use crate::input::EdgeProducer;

/// Edge handlers one driver instance can hold.
const MAX_EDGE_HANDLERS: usize = 8;

/// Highest GPIO number on the ESP32-S3.
const MAX_LINE: LineId = 48;

pub struct EspGpio {
    // Boxed so the handler argument address stays put while the Vec moves.
    handlers: heapless::Vec<(LineId, Box<EdgeProducer>), MAX_EDGE_HANDLERS>,
    #[cfg(not(target_os = "espidf"))]
    levels: std::collections::HashMap<LineId, LineLevel>,
}

impl Default for EspGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl EspGpio {
    pub fn new() -> Self {
        Self {
            handlers: heapless::Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            levels: std::collections::HashMap::new(),
        }
    }

    fn check_line(line: LineId) -> Result<(), PortError> {
        if (0..=MAX_LINE).contains(&line) {
            Ok(())
        } else {
            Err(PortError::InvalidLine(line))
        }
    }

    fn take_handler(&mut self, line: LineId) -> Option<Box<EdgeProducer>> {
        let idx = self.handlers.iter().position(|(l, _)| *l == line)?;
        Some(self.handlers.swap_remove(idx).1)
    }

    /// Host stand-in for a physical edge: set the level, then run the
    /// registered producer exactly as the ISR would.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulate_edge(&mut self, line: LineId, level: LineLevel) -> bool {
        self.levels.insert(line, level);
        self.handlers
            .iter()
            .find(|(l, _)| *l == line)
            .is_some_and(|(_, producer)| producer.signal_edge())
    }
}

impl Drop for EspGpio {
    fn drop(&mut self) {
        let lines: heapless::Vec<LineId, MAX_EDGE_HANDLERS> =
            self.handlers.iter().map(|(line, _)| *line).collect();
        for line in lines {
            self.unregister_edge_handler(line);
        }
    }
}

// ── LinePort ──────────────────────────────────────────────────

impl LinePort for EspGpio {
    #[cfg(target_os = "espidf")]
    fn configure_line(&mut self, line: LineId, config: LineConfig) -> Result<(), PortError> {
        Self::check_line(line)?;
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << line,
            mode: match config.direction {
                Direction::Input => gpio_mode_t_GPIO_MODE_INPUT,
                Direction::Output => gpio_mode_t_GPIO_MODE_OUTPUT,
                // Input stays enabled so the line can still be sampled.
                Direction::OutputOpenDrain => gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
            },
            pull_up_en: if config.pull == Pull::Up {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: if config.pull == Pull::Down {
                gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
            } else {
                gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
            },
            intr_type: intr_type(config.interrupt),
            ..Default::default()
        };
        // SAFETY: plain register configuration of a validated pin number.
        check(unsafe { gpio_config(&cfg) }, line)
    }

    #[cfg(not(target_os = "espidf"))]
    fn configure_line(&mut self, line: LineId, config: LineConfig) -> Result<(), PortError> {
        Self::check_line(line)?;
        let idle = match (config.direction, config.pull) {
            (Direction::Input, Pull::Down) => LineLevel::Low,
            _ => LineLevel::High,
        };
        self.levels.insert(line, idle);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_level(&self, line: LineId) -> LineLevel {
        // SAFETY: read-only register access.
        LineLevel::from_bool(unsafe { gpio_get_level(line) } != 0)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_level(&self, line: LineId) -> LineLevel {
        self.levels.get(&line).copied().unwrap_or(LineLevel::High)
    }

    #[cfg(target_os = "espidf")]
    fn write_level(&mut self, line: LineId, level: LineLevel) -> Result<(), PortError> {
        // SAFETY: writes the output register of a configured pin.
        check(unsafe { gpio_set_level(line, u32::from(level.is_high())) }, line)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_level(&mut self, line: LineId, level: LineLevel) -> Result<(), PortError> {
        Self::check_line(line)?;
        self.levels.insert(line, level);
        Ok(())
    }
}

// ── EdgeInterruptPort ─────────────────────────────────────────

impl EdgeInterruptPort for EspGpio {
    fn register_edge_handler(
        &mut self,
        line: LineId,
        polarity: EdgePolarity,
        producer: EdgeProducer,
    ) -> Result<(), PortError> {
        Self::check_line(line)?;
        self.unregister_edge_handler(line);

        self.handlers
            .push((line, Box::new(producer)))
            .map_err(|_| PortError::ResourceExhausted)?;

        #[cfg(target_os = "espidf")]
        {
            let arg = self
                .handlers
                .last()
                .map(|(_, p)| core::ptr::from_ref::<EdgeProducer>(p).cast_mut().cast::<core::ffi::c_void>())
                .ok_or(PortError::ResourceExhausted)?;

            // SAFETY: the shared ISR service is installed at most once
            // (INVALID_STATE means already installed); `arg` points into a
            // Box owned by `self.handlers` that is only freed after
            // `gpio_isr_handler_remove` for this line.
            let attached = unsafe {
                let ret = gpio_install_isr_service(0);
                if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
                    Err(PortError::Platform(ret))
                } else {
                    check(gpio_set_intr_type(line, intr_type(polarity)), line)
                        .and_then(|()| check(gpio_isr_handler_add(line, Some(edge_isr), arg), line))
                        .and_then(|()| check(gpio_intr_enable(line), line))
                }
            };
            if let Err(e) = attached {
                // SAFETY: removing a handler that may not exist is harmless.
                unsafe { gpio_isr_handler_remove(line) };
                self.take_handler(line);
                return Err(e);
            }
        }

        info!("gpio: edge handler on GPIO {} ({:?})", line, polarity);
        Ok(())
    }

    fn unregister_edge_handler(&mut self, line: LineId) {
        #[cfg(target_os = "espidf")]
        if self.handlers.iter().any(|(l, _)| *l == line) {
            // SAFETY: detach first so the ISR can no longer reach the box
            // that is dropped below.
            unsafe {
                gpio_intr_disable(line);
                gpio_isr_handler_remove(line);
            }
        }
        if self.take_handler(line).is_some() {
            info!("gpio: edge handler on GPIO {} removed", line);
        }
    }
}

// ── ESP-IDF helpers ───────────────────────────────────────────

/// ISR trampoline registered with the GPIO ISR service.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn edge_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the address of a boxed EdgeProducer registered in
    // `register_edge_handler`; it stays valid until the handler is removed.
    let producer = unsafe { &*arg.cast::<EdgeProducer>() };
    producer.signal_edge();
}

#[cfg(target_os = "espidf")]
fn intr_type(polarity: EdgePolarity) -> gpio_int_type_t {
    match polarity {
        EdgePolarity::Disabled => gpio_int_type_t_GPIO_INTR_DISABLE,
        EdgePolarity::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
        EdgePolarity::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
        EdgePolarity::Any => gpio_int_type_t_GPIO_INTR_ANYEDGE,
    }
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t, line: LineId) -> Result<(), PortError> {
    match ret {
        r if r == ESP_OK as i32 => Ok(()),
        r if r == ESP_ERR_INVALID_ARG as i32 => Err(PortError::InvalidLine(line)),
        r if r == ESP_ERR_NO_MEM as i32 || r == ESP_ERR_NOT_FOUND as i32 => {
            Err(PortError::ResourceExhausted)
        }
        r => Err(PortError::Platform(r)),
    }
}
