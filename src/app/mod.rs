//! Application boundary: port traits and outbound events.
//!
//! All interaction with hardware happens through the **port traits**
//! defined in [`ports`], keeping the pipeline and bus controller fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
