//! Two-wire (I²C) bus bring-up, address scan and stuck-bus recovery.
//!
//! ## Stuck data line
//!
//! A peer that was interrupted mid-byte (brown-out, MCU reset during a
//! transfer) can keep SDA low indefinitely, and every later transaction
//! fails.  Clocking SCL nine times lets the peer finish whatever byte it
//! thinks it is sending and release SDA; the peripheral driver is then
//! rebuilt from scratch.
//!
//! ```text
//!  SCL ‾‾|__|‾‾|__|‾‾ … ×9 ‾‾   uninstall   settle 100 ms   install(config)
//!        5ms 5ms
//! ```
//!
//! Recovery is a plain blocking sequence on the caller's task (≈190 ms in
//! total).  It must never be called from interrupt context.

use core::iter::FusedIterator;

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, LineConfig, LineId, LineLevel, LinePort, TwoWirePort};
use crate::error::BusError;

/// SCL pulses needed to walk any peer through the rest of a byte plus ACK.
pub const RECOVERY_PULSES: u32 = 9;
/// Half period of each recovery pulse.
pub const PULSE_HALF_PERIOD_MS: u32 = 5;
/// Quiet time between driver delete and reinstall.
pub const SETTLE_MS: u32 = 100;
/// Per-address probe timeout.
pub const PROBE_TIMEOUT_MS: u32 = 50;
/// Highest 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7F;
/// Fast-mode plus ceiling.
pub const MAX_FREQUENCY_HZ: u32 = 1_000_000;

/// Static configuration of the bus peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// SCL.
    pub clock_line: LineId,
    /// SDA.
    pub data_line: LineId,
    pub frequency_hz: u32,
    /// Enable the chip's weak pull-ups (for boards without external resistors).
    pub internal_pullups: bool,
}

impl BusConfig {
    pub const fn new(clock_line: LineId, data_line: LineId, frequency_hz: u32) -> Self {
        Self { clock_line, data_line, frequency_hz, internal_pullups: true }
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if self.clock_line < 0 || self.data_line < 0 {
            return Err(BusError::InvalidConfig("negative line id"));
        }
        if self.clock_line == self.data_line {
            return Err(BusError::InvalidConfig("SCL and SDA share a line"));
        }
        if self.frequency_hz == 0 || self.frequency_hz > MAX_FREQUENCY_HZ {
            return Err(BusError::InvalidConfig("frequency out of range"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Uninitialized,
    Ready,
    /// Reported by a caller that saw transactions failing; cleared by `recover`.
    Locked,
}

/// Result of probing one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: u8,
    pub present: bool,
}

/// Owns the bus peripheral plus the GPIO access needed to bit-bang SCL.
///
/// Methods take `&mut self`; callers sharing one controller across tasks
/// wrap it in a `Mutex` so `initialize` and `recover` are serialised.
pub struct BusRecoveryController<B: TwoWirePort, L: LinePort, D: DelayNs> {
    bus: B,
    lines: L,
    delay: D,
    config: Option<BusConfig>,
    state: BusState,
}

impl<B: TwoWirePort, L: LinePort, D: DelayNs> BusRecoveryController<B, L, D> {
    pub fn new(bus: B, lines: L, delay: D) -> Self {
        Self {
            bus,
            lines,
            delay,
            config: None,
            state: BusState::Uninitialized,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    /// Last configuration handed to `initialize`, if any.
    pub fn config(&self) -> Option<&BusConfig> {
        self.config.as_ref()
    }

    /// Configure and start the peripheral with internal pull-ups enabled.
    pub fn initialize(
        &mut self,
        clock_line: LineId,
        data_line: LineId,
        frequency_hz: u32,
    ) -> Result<(), BusError> {
        self.initialize_with(BusConfig::new(clock_line, data_line, frequency_hz))
    }

    /// Configure and start the peripheral.
    ///
    /// A valid configuration is remembered for [`recover`](Self::recover)
    /// even if the install itself fails.  An already running driver is
    /// deleted first.
    pub fn initialize_with(&mut self, config: BusConfig) -> Result<(), BusError> {
        config.validate()?;
        self.config = Some(config);

        if self.state != BusState::Uninitialized {
            self.bus.uninstall();
            self.state = BusState::Uninitialized;
        }

        match self.bus.install(&config) {
            Ok(()) => {
                self.state = BusState::Ready;
                info!(
                    "bus: ready (SDA={}, SCL={}, {} Hz)",
                    config.data_line, config.clock_line, config.frequency_hz
                );
                Ok(())
            }
            Err(e) => {
                warn!("bus: driver install failed: {}", e);
                Err(BusError::Init(e))
            }
        }
    }

    /// Record an externally detected lock-up.
    pub fn mark_locked(&mut self) {
        if self.state == BusState::Ready {
            warn!("bus: marked locked");
            self.state = BusState::Locked;
        }
    }

    /// Lazily probe every 7-bit address (0..=127).
    ///
    /// Each call starts a fresh scan.  With no driver installed every
    /// address reports absent and no traffic is generated.
    pub fn probe_all_addresses(&mut self) -> AddressScan<'_, B> {
        AddressScan {
            live: self.state != BusState::Uninitialized,
            bus: &mut self.bus,
            next: 0,
        }
    }

    /// Clock SCL nine times to free a stuck peer, then rebuild the driver
    /// with the last configuration.
    ///
    /// Returns the outcome of the reinstall only; whether the peer actually
    /// let go shows up in the next transaction.
    pub fn recover(&mut self) -> Result<(), BusError> {
        let config = self.config.ok_or(BusError::NotConfigured)?;
        info!("bus: clocking SCL {} x{} to release SDA", config.clock_line, RECOVERY_PULSES);

        if let Err(e) = self
            .lines
            .configure_line(config.clock_line, LineConfig::open_drain_output())
        {
            warn!("bus: SCL {} reconfigure failed: {}", config.clock_line, e);
        }

        for _ in 0..RECOVERY_PULSES {
            self.drive_clock(config.clock_line, LineLevel::Low);
            self.delay.delay_ms(PULSE_HALF_PERIOD_MS);
            self.drive_clock(config.clock_line, LineLevel::High);
            self.delay.delay_ms(PULSE_HALF_PERIOD_MS);
        }

        self.bus.uninstall();
        self.state = BusState::Uninitialized;
        self.delay.delay_ms(SETTLE_MS);

        self.initialize_with(config)?;
        info!("bus: recovered");
        Ok(())
    }

    fn drive_clock(&mut self, line: LineId, level: LineLevel) {
        if let Err(e) = self.lines.write_level(line, level) {
            warn!("bus: SCL {} write {:?} failed: {}", line, level, e);
        }
    }
}

/// Boot-time bring-up: initialize, and on failure try one recovery.
///
/// Never fails; the outcome goes to `events` and the returned state.
pub fn bring_up<B: TwoWirePort, L: LinePort, D: DelayNs>(
    bus: &mut BusRecoveryController<B, L, D>,
    config: &BusConfig,
    events: &mut impl EventSink,
) -> BusState {
    match bus.initialize_with(*config) {
        Ok(()) => {
            events.emit(&AppEvent::BusReady { frequency_hz: config.frequency_hz });
            return bus.state();
        }
        Err(e) => events.emit(&AppEvent::BusInitFailed(e)),
    }

    match bus.recover() {
        Ok(()) => {
            events.emit(&AppEvent::BusRecovered);
            events.emit(&AppEvent::BusReady { frequency_hz: config.frequency_hz });
        }
        Err(e) => {
            events.emit(&AppEvent::BusInitFailed(e));
            warn!("bus: unavailable, continuing without it");
        }
    }
    bus.state()
}

/// Iterator returned by [`BusRecoveryController::probe_all_addresses`].
pub struct AddressScan<'a, B: TwoWirePort> {
    bus: &'a mut B,
    next: u8,
    live: bool,
}

impl<B: TwoWirePort> Iterator for AddressScan<'_, B> {
    type Item = ProbeResult;

    fn next(&mut self) -> Option<ProbeResult> {
        if self.next > MAX_ADDRESS {
            return None;
        }
        let address = self.next;
        self.next += 1;
        // Any failure (NACK, timeout, stuck bus) just means "not present".
        let present = self.live && self.bus.probe(address, PROBE_TIMEOUT_MS).is_ok();
        Some(ProbeResult { address, present })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (usize::from(MAX_ADDRESS) + 1).saturating_sub(usize::from(self.next));
        (remaining, Some(remaining))
    }
}

impl<B: TwoWirePort> ExactSizeIterator for AddressScan<'_, B> {}

impl<B: TwoWirePort> FusedIterator for AddressScan<'_, B> {}
