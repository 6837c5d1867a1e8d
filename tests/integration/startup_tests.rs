//! Boot-time wiring: a JSON device config drives bus bring-up, the scan
//! table and the button pipeline, with application events going through
//! the log sink.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pegavox::adapters::log_sink::LogEventSink;
use pegavox::app::events::AppEvent;
use pegavox::app::ports::{ByteSink, EventSink, PortError};
use pegavox::bus::{self, BusRecoveryController, BusState};
use pegavox::config::DeviceConfig;
use pegavox::diagnostics;
use pegavox::input::InputEventPipeline;

use crate::mock_hw::{Journal, ManualClock, MockLines, RecordingDelay, SimBus, wait_until};

const BOARD_JSON: &str = r#"{
    "button": { "line": 5, "debounce_ms": 20 },
    "bus": { "clock_line": 9, "data_line": 8, "frequency_hz": 100000, "internal_pullups": false },
    "printer": { "uart_port": 1, "tx_line": 17, "rx_line": 18, "baud": 19200 },
    "consumer_task": { "priority": 10, "stack_kb": 4 }
}"#;

#[derive(Default)]
struct CapturePrinter(Vec<u8>);

impl ByteSink for CapturePrinter {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PortError> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

#[test]
fn json_config_drives_bus_scan() {
    let config = DeviceConfig::from_json(BOARD_JSON).unwrap();
    assert!(!config.bus.internal_pullups);

    let journal = Journal::default();
    let sim = SimBus::with_journal(journal.clone()).with_responders(&[0x3C]);
    sim.fail_installs(1);
    let mut ctl = BusRecoveryController::new(
        sim,
        MockLines::with_journal(journal.clone()),
        RecordingDelay::with_journal(journal),
    );
    let mut events = LogEventSink::new();

    // First install fails, the single recovery brings the bus back.
    assert_eq!(bus::bring_up(&mut ctl, &config.bus, &mut events), BusState::Ready);

    let scan: Vec<_> = ctl.probe_all_addresses().collect();
    let table = diagnostics::format_scan_table(scan.iter().copied());
    assert!(table.lines().any(|l| l == "30: -- -- -- -- -- -- -- -- -- -- -- -- 3c -- -- --"));

    let responders = diagnostics::responders(scan);
    assert_eq!(responders.as_slice(), &[0x3C]);
    events.emit(&AppEvent::ScanCompleted { responders });
}

#[test]
fn button_press_prints_receipt() {
    let config = DeviceConfig::from_json(BOARD_JSON).unwrap();
    let lines = MockLines::new();
    let clock = ManualClock::new();
    let pipeline = Arc::new(InputEventPipeline::new(lines.clone(), clock.clone()));
    pipeline
        .configure(
            config.button.line,
            Duration::from_millis(config.button.debounce_ms.into()),
        )
        .unwrap();

    let printer = Arc::new(Mutex::new(CapturePrinter::default()));
    let prints = Arc::new(AtomicU32::new(0));
    {
        let printer = Arc::clone(&printer);
        let prints = Arc::clone(&prints);
        let line = config.button.line;
        let events = Mutex::new(LogEventSink::new());
        pipeline.set_callback(move || {
            events.lock().unwrap().emit(&AppEvent::Activated { line });
            printer.lock().unwrap().write_bytes(b"Hello world\n").unwrap();
            prints.fetch_add(1, Ordering::SeqCst);
        });
    }

    let worker = Arc::clone(&pipeline);
    let consumer = std::thread::spawn(move || worker.run());

    // 20 ms window from the JSON config: 15 ms bounces, 25 ms prints.
    for t in [0, 15, 25] {
        clock.set(t);
        let before = pipeline.stats().processed();
        assert!(lines.press(config.button.line));
        assert!(wait_until(|| pipeline.stats().processed() > before));
    }

    assert_eq!(prints.load(Ordering::SeqCst), 2);
    assert_eq!(printer.lock().unwrap().0, b"Hello world\nHello world\n");

    pipeline.teardown();
    assert_eq!(consumer.join().unwrap(), Ok(()));
}
