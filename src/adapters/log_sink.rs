//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A future OLED status adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Activated { line } => {
                info!("BUTTON | GPIO {} pressed, printing", line);
            }
            AppEvent::PrintFailed(e) => {
                warn!("PRINT  | write failed: {}", e);
            }
            AppEvent::BusReady { frequency_hz } => {
                info!("BUS    | ready @ {} Hz", frequency_hz);
            }
            AppEvent::BusInitFailed(e) => {
                warn!("BUS    | init failed: {}", e);
            }
            AppEvent::BusRecovered => {
                info!("BUS    | recovered after clock-pulse unlock");
            }
            AppEvent::ScanCompleted { responders } => {
                info!("BUS    | scan complete, {} device(s): {:02x?}", responders.len(), responders.as_slice());
            }
        }
    }
}
