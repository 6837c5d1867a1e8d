//! Outbound application events.
//!
//! The firmware wiring emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial today, an OLED status
//! line later.

use super::ports::{LineId, PortError};
use crate::error::BusError;

/// Structured events emitted around the button pipeline and sensor bus.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A debounced activation was accepted on `line`.
    Activated { line: LineId },

    /// The receipt could not be written to the printer.
    PrintFailed(PortError),

    /// The sensor bus driver is installed and ready.
    BusReady { frequency_hz: u32 },

    /// Bus initialisation failed.
    BusInitFailed(BusError),

    /// The clock-pulse unlock sequence ran and the driver came back.
    BusRecovered,

    /// A full address scan finished.
    ScanCompleted { responders: heapless::Vec<u8, 128> },
}
