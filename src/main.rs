//! PegaVox firmware entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  boot                                                         │
//! │   ├─ I²C bring-up (one clock-pulse recovery on failure)       │
//! │   ├─ address scan → i2cdetect-style table on the console      │
//! │   ├─ printer UART (fatal if missing)                          │
//! │   ├─ button pipeline: GPIO ISR → EdgeQueue → consumer task    │
//! │   └─ idle                                                     │
//! │                                                               │
//! │  consumer task (prio 10): debounce → re-sample → print        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use pegavox::adapters::log_sink::LogEventSink;
use pegavox::adapters::time::{SystemClock, TaskDelay};
use pegavox::app::events::AppEvent;
use pegavox::app::ports::{ByteSink, EventSink};
use pegavox::bus::{self, BusRecoveryController, BusState, ProbeResult, SETTLE_MS};
use pegavox::config::DeviceConfig;
use pegavox::diagnostics;
use pegavox::drivers::gpio::EspGpio;
use pegavox::drivers::i2c::EspI2cBus;
use pegavox::drivers::task_pin::{self, Core, TaskSpec};
use pegavox::drivers::uart::UartSink;
use pegavox::input::InputEventPipeline;

const I2C_PORT: i32 = 0;

/// Test receipt: ESC @ (printer reset), two text lines, paper feed.
const RECEIPT: &[u8] = b"\x1b@Hello world\nPegaVox Test Print\n\n\n\n";

type Button = InputEventPipeline<EspGpio, SystemClock>;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("PegaVox v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let mut events = LogEventSink::new();

    // ── 2. Sensor bus ─────────────────────────────────────────
    let mut sensor_bus = BusRecoveryController::new(EspI2cBus::new(I2C_PORT), EspGpio::new(), TaskDelay);
    if bus::bring_up(&mut sensor_bus, &config.bus, &mut events) == BusState::Ready {
        TaskDelay.delay_ms(SETTLE_MS);
        let scan: Vec<ProbeResult> = sensor_bus.probe_all_addresses().collect();
        info!("I2C scan:\n{}", diagnostics::format_scan_table(scan.iter().copied()));
        events.emit(&AppEvent::ScanCompleted { responders: diagnostics::responders(scan) });
    }

    // ── 3. Printer ────────────────────────────────────────────
    let printer = UartSink::open(&config.printer)?;

    // ── 4. Button pipeline ────────────────────────────────────
    let line = config.button.line;
    let pipeline: Arc<Button> = Arc::new(InputEventPipeline::new(EspGpio::new(), SystemClock::new()));
    pipeline.configure(line, Duration::from_millis(config.button.debounce_ms.into()))?;

    let printer = Mutex::new(printer);
    let events = Mutex::new(events);
    pipeline.set_callback(move || {
        let mut events = events.lock().unwrap_or_else(PoisonError::into_inner);
        events.emit(&AppEvent::Activated { line });
        if let Err(e) = printer.lock().unwrap_or_else(PoisonError::into_inner).write_bytes(RECEIPT) {
            events.emit(&AppEvent::PrintFailed(e));
        }
    });

    // ── 5. Consumer task ──────────────────────────────────────
    let spec = TaskSpec::from_config(c"button", Core::App, &config.consumer_task);
    let worker = Arc::clone(&pipeline);
    let handle = task_pin::spawn_pinned(&spec, move || {
        if let Err(e) = worker.run() {
            error!("button task exited: {}", e);
        }
    })?;

    info!("Ready: press the button on GPIO {}", line);
    idle(&pipeline, handle)
}

/// Build-time JSON override, else the board defaults.
fn load_config() -> DeviceConfig {
    let Some(json) = option_env!("PEGAVOX_CONFIG") else {
        return DeviceConfig::default();
    };
    match DeviceConfig::from_json(json) {
        Ok(config) => {
            info!("Config: using PEGAVOX_CONFIG override");
            config
        }
        Err(e) => {
            warn!("Config: PEGAVOX_CONFIG rejected ({}), using defaults", e);
            DeviceConfig::default()
        }
    }
}

#[cfg(target_os = "espidf")]
fn idle(_pipeline: &Arc<Button>, _handle: JoinHandle<()>) -> Result<()> {
    loop {
        esp_idf_hal::delay::FreeRtos::delay_ms(1000);
    }
}

/// Host run: there is no button, so shut the pipeline down after a short
/// idle and let the consumer exit cleanly.
#[cfg(not(target_os = "espidf"))]
fn idle(pipeline: &Arc<Button>, handle: JoinHandle<()>) -> Result<()> {
    std::thread::sleep(Duration::from_secs(1));
    pipeline.teardown();
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("button task panicked"))?;
    info!("sim: button task stopped, {:?}", pipeline.stats());
    Ok(())
}
