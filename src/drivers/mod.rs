//! Peripheral drivers implementing the port traits, plus task helpers.

pub mod gpio;
pub mod i2c;
pub mod task_pin;
pub mod uart;
