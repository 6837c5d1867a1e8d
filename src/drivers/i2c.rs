//! Legacy ESP-IDF I²C master driver behind [`TwoWirePort`].
//!
//! The driver is installed and deleted on demand so the recovery sequence
//! can take the clock line over as a plain GPIO in between.
//!
//! On host builds the bus is empty: `install` always succeeds and every
//! probe is NACKed.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::debug;

use crate::app::ports::{PortError, TwoWirePort};
use crate::bus::BusConfig;

/// I²C controller number (`I2C_NUM_0` / `I2C_NUM_1`).
pub type I2cPort = i32;

pub struct EspI2cBus {
    port: I2cPort,
    installed: bool,
}

impl EspI2cBus {
    pub fn new(port: I2cPort) -> Self {
        Self { port, installed: false }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

impl Drop for EspI2cBus {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(target_os = "espidf")]
impl TwoWirePort for EspI2cBus {
    fn install(&mut self, config: &BusConfig) -> Result<(), PortError> {
        let sys_config = i2c_config_t {
            mode: i2c_mode_t_I2C_MODE_MASTER,
            sda_io_num: config.data_line,
            sda_pullup_en: config.internal_pullups,
            scl_io_num: config.clock_line,
            scl_pullup_en: config.internal_pullups,
            __bindgen_anon_1: i2c_config_t__bindgen_ty_1 {
                master: i2c_config_t__bindgen_ty_1__bindgen_ty_1 {
                    clk_speed: config.frequency_hz,
                },
            },
            ..Default::default()
        };

        // SAFETY: configuration structs are copied by the driver; the port
        // number is checked by ESP-IDF.
        unsafe {
            check(i2c_param_config(self.port, &sys_config))?;
            check(i2c_driver_install(self.port, i2c_mode_t_I2C_MODE_MASTER, 0, 0, 0))?;
        }
        self.installed = true;
        debug!("i2c{}: driver installed", self.port);
        Ok(())
    }

    fn uninstall(&mut self) {
        if !self.installed {
            return;
        }
        // SAFETY: driver was installed by `install` on this port.
        unsafe { i2c_driver_delete(self.port) };
        self.installed = false;
        debug!("i2c{}: driver deleted", self.port);
    }

    fn probe(&mut self, address: u8, timeout_ms: u32) -> Result<(), PortError> {
        if !self.installed {
            return Err(PortError::NotInstalled);
        }

        // SAFETY: the command link is created, used and freed within this
        // block; every call receives the non-null handle.
        unsafe {
            let cmd = i2c_cmd_link_create();
            if cmd.is_null() {
                return Err(PortError::ResourceExhausted);
            }
            i2c_master_start(cmd);
            i2c_master_write_byte(cmd, (address << 1) | i2c_rw_t_I2C_MASTER_WRITE as u8, true);
            i2c_master_stop(cmd);
            let ret = i2c_master_cmd_begin(self.port, cmd, ms_to_ticks(timeout_ms));
            i2c_cmd_link_delete(cmd);
            check(ret)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl TwoWirePort for EspI2cBus {
    fn install(&mut self, config: &BusConfig) -> Result<(), PortError> {
        debug!(
            "i2c{} (sim): installed, SCL={} SDA={} @ {} Hz",
            self.port, config.clock_line, config.data_line, config.frequency_hz
        );
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
    }

    fn probe(&mut self, _address: u8, _timeout_ms: u32) -> Result<(), PortError> {
        if self.installed { Err(PortError::Nack) } else { Err(PortError::NotInstalled) }
    }
}

#[cfg(target_os = "espidf")]
fn ms_to_ticks(ms: u32) -> TickType_t {
    // Round up so a short timeout never becomes zero ticks.
    (ms.saturating_mul(CONFIG_FREERTOS_HZ).div_ceil(1000)) as TickType_t
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), PortError> {
    match ret {
        r if r == ESP_OK as i32 => Ok(()),
        r if r == ESP_FAIL => Err(PortError::Nack),
        r if r == ESP_ERR_TIMEOUT as i32 => Err(PortError::Timeout),
        r if r == ESP_ERR_INVALID_STATE as i32 => Err(PortError::NotInstalled),
        r if r == ESP_ERR_NO_MEM as i32 => Err(PortError::ResourceExhausted),
        r => Err(PortError::Platform(r)),
    }
}
