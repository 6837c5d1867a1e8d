//! Mock hardware adapters for integration tests.
//!
//! Every mock can share one [`Journal`] so tests can assert on the exact
//! interleaving of line writes, delays and bus driver calls without
//! touching real GPIO/I²C registers.  The mocks are cheap `Clone` handles
//! over shared state so a test keeps one copy while the component under
//! test owns the other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use pegavox::app::events::AppEvent;
use pegavox::app::ports::{
    Clock, EdgeInterruptPort, EdgePolarity, EventSink, LineConfig, LineId, LineLevel, LinePort,
    PortError, TwoWirePort,
};
use pegavox::bus::BusConfig;
use pegavox::input::EdgeProducer;
use pegavox::time::MonotonicTick;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ── Journal ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Configure(LineId, LineConfig),
    Write(LineId, LineLevel),
    DelayMs(u32),
    DelayNs(u32),
    Install(BusConfig),
    Uninstall,
    Probe(u8),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Op>>>);

#[allow(dead_code)]
impl Journal {
    pub fn record(&self, op: Op) {
        lock(&self.0).push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        lock(&self.0).clone()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

// ── MockLines ─────────────────────────────────────────────────

#[derive(Default)]
struct LinesInner {
    levels: HashMap<LineId, LineLevel>,
    producers: HashMap<LineId, EdgeProducer>,
    fail_configure: Option<PortError>,
    fail_register: Option<PortError>,
}

/// GPIO mock: settable input levels, recorded writes, and a `fire` hook
/// that plays the role of the interrupt.
#[derive(Clone, Default)]
pub struct MockLines {
    inner: Arc<Mutex<LinesInner>>,
    journal: Journal,
}

#[allow(dead_code)]
impl MockLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self { inner: Arc::default(), journal }
    }

    pub fn set_level(&self, line: LineId, level: LineLevel) {
        lock(&self.inner).levels.insert(line, level);
    }

    /// Run the registered producer as the ISR would.  Returns whether the
    /// edge was queued; `false` if nothing is registered for `line`.
    pub fn fire(&self, line: LineId) -> bool {
        lock(&self.inner)
            .producers
            .get(&line)
            .is_some_and(EdgeProducer::signal_edge)
    }

    /// Drive the line to its active (low) level and fire an edge.
    pub fn press(&self, line: LineId) -> bool {
        self.set_level(line, LineLevel::Low);
        self.fire(line)
    }

    pub fn is_registered(&self, line: LineId) -> bool {
        lock(&self.inner).producers.contains_key(&line)
    }

    pub fn fail_configure_with(&self, err: PortError) {
        lock(&self.inner).fail_configure = Some(err);
    }

    pub fn fail_register_with(&self, err: PortError) {
        lock(&self.inner).fail_register = Some(err);
    }
}

impl LinePort for MockLines {
    fn configure_line(&mut self, line: LineId, config: LineConfig) -> Result<(), PortError> {
        self.journal.record(Op::Configure(line, config));
        match lock(&self.inner).fail_configure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read_level(&self, line: LineId) -> LineLevel {
        lock(&self.inner).levels.get(&line).copied().unwrap_or(LineLevel::High)
    }

    fn write_level(&mut self, line: LineId, level: LineLevel) -> Result<(), PortError> {
        self.journal.record(Op::Write(line, level));
        lock(&self.inner).levels.insert(line, level);
        Ok(())
    }
}

impl EdgeInterruptPort for MockLines {
    fn register_edge_handler(
        &mut self,
        line: LineId,
        _polarity: EdgePolarity,
        producer: EdgeProducer,
    ) -> Result<(), PortError> {
        let mut inner = lock(&self.inner);
        if let Some(e) = inner.fail_register {
            return Err(e);
        }
        inner.producers.insert(line, producer);
        Ok(())
    }

    fn unregister_edge_handler(&mut self, line: LineId) {
        lock(&self.inner).producers.remove(&line);
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Millisecond clock that only moves when the test says so.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU32>);

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u32) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> MonotonicTick {
        MonotonicTick(self.0.load(Ordering::SeqCst))
    }
}

// ── SimBus ────────────────────────────────────────────────────

#[derive(Default)]
struct BusInner {
    responders: Vec<u8>,
    install_failures: u32,
    installed: bool,
    probes: u32,
}

/// I²C mock: a fixed set of responding addresses and a programmable
/// number of failing installs.
#[derive(Clone, Default)]
pub struct SimBus {
    inner: Arc<Mutex<BusInner>>,
    journal: Journal,
}

#[allow(dead_code)]
impl SimBus {
    pub fn with_journal(journal: Journal) -> Self {
        Self { inner: Arc::default(), journal }
    }

    pub fn with_responders(self, responders: &[u8]) -> Self {
        lock(&self.inner).responders = responders.to_vec();
        self
    }

    /// The next `n` installs fail with a timeout.
    pub fn fail_installs(&self, n: u32) {
        lock(&self.inner).install_failures = n;
    }

    pub fn probes(&self) -> u32 {
        lock(&self.inner).probes
    }

    pub fn is_installed(&self) -> bool {
        lock(&self.inner).installed
    }
}

impl TwoWirePort for SimBus {
    fn install(&mut self, config: &BusConfig) -> Result<(), PortError> {
        self.journal.record(Op::Install(*config));
        let mut inner = lock(&self.inner);
        if inner.install_failures > 0 {
            inner.install_failures -= 1;
            return Err(PortError::Timeout);
        }
        inner.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.journal.record(Op::Uninstall);
        lock(&self.inner).installed = false;
    }

    fn probe(&mut self, address: u8, _timeout_ms: u32) -> Result<(), PortError> {
        let mut inner = lock(&self.inner);
        inner.probes += 1;
        if !inner.installed {
            return Err(PortError::NotInstalled);
        }
        if inner.responders.contains(&address) { Ok(()) } else { Err(PortError::Nack) }
    }
}

// ── RecordingDelay ────────────────────────────────────────────

/// Delay that records instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    journal: Journal,
}

#[allow(dead_code)]
impl RecordingDelay {
    pub fn with_journal(journal: Journal) -> Self {
        Self { journal }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.journal.record(Op::DelayNs(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.journal.record(Op::DelayMs(ms));
    }
}

// ── RecordingEvents ───────────────────────────────────────────

/// Event sink that keeps every emitted event.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingEvents(pub Vec<AppEvent>);

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &AppEvent) {
        self.0.push(event.clone());
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Poll `cond` until it holds or two seconds pass.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
