//! Bus bring-up, address scan and nine-pulse recovery against the mock
//! bus, GPIO and delay, all writing to one shared journal.

use pegavox::app::events::AppEvent;
use pegavox::app::ports::{LineConfig, LineLevel, PortError};
use pegavox::bus::{
    self, BusConfig, BusRecoveryController, BusState, MAX_ADDRESS, PULSE_HALF_PERIOD_MS,
    RECOVERY_PULSES, SETTLE_MS,
};
use pegavox::error::BusError;

use crate::mock_hw::{Journal, MockLines, Op, RecordingDelay, RecordingEvents, SimBus};

const SCL: i32 = 42;
const SDA: i32 = 41;

type Controller = BusRecoveryController<SimBus, MockLines, RecordingDelay>;

fn rig(responders: &[u8]) -> (Controller, SimBus, Journal) {
    let journal = Journal::default();
    let bus = SimBus::with_journal(journal.clone()).with_responders(responders);
    let controller = BusRecoveryController::new(
        bus.clone(),
        MockLines::with_journal(journal.clone()),
        RecordingDelay::with_journal(journal.clone()),
    );
    (controller, bus, journal)
}

fn pulse_train() -> Vec<Op> {
    let mut ops = vec![Op::Configure(SCL, LineConfig::open_drain_output())];
    for _ in 0..RECOVERY_PULSES {
        ops.push(Op::Write(SCL, LineLevel::Low));
        ops.push(Op::DelayMs(PULSE_HALF_PERIOD_MS));
        ops.push(Op::Write(SCL, LineLevel::High));
        ops.push(Op::DelayMs(PULSE_HALF_PERIOD_MS));
    }
    ops
}

// ── initialize ────────────────────────────────────────────────

#[test]
fn initialize_installs_driver() {
    let (mut ctl, bus, journal) = rig(&[]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();

    assert_eq!(ctl.state(), BusState::Ready);
    assert!(bus.is_installed());
    assert_eq!(journal.ops(), vec![Op::Install(BusConfig::new(SCL, SDA, 400_000))]);
}

#[test]
fn invalid_config_never_reaches_driver() {
    let (mut ctl, _bus, journal) = rig(&[]);

    assert!(matches!(ctl.initialize(SCL, SCL, 400_000), Err(BusError::InvalidConfig(_))));
    assert!(matches!(ctl.initialize(SCL, SDA, 0), Err(BusError::InvalidConfig(_))));
    assert!(matches!(ctl.initialize(SCL, SDA, 5_000_000), Err(BusError::InvalidConfig(_))));

    assert_eq!(ctl.state(), BusState::Uninitialized);
    assert!(journal.ops().is_empty());
    assert_eq!(ctl.recover(), Err(BusError::NotConfigured));
}

#[test]
fn install_failure_leaves_bus_uninitialized() {
    let (mut ctl, bus, _journal) = rig(&[]);
    bus.fail_installs(1);

    assert_eq!(
        ctl.initialize(SCL, SDA, 400_000),
        Err(BusError::Init(PortError::Timeout))
    );
    assert_eq!(ctl.state(), BusState::Uninitialized);
}

#[test]
fn reinitialize_deletes_running_driver_first() {
    let (mut ctl, _bus, journal) = rig(&[]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();
    journal.clear();

    ctl.initialize(SCL, SDA, 100_000).unwrap();
    assert_eq!(
        journal.ops(),
        vec![Op::Uninstall, Op::Install(BusConfig::new(SCL, SDA, 100_000))]
    );
    assert_eq!(ctl.config().map(|c| c.frequency_hz), Some(100_000));
}

// ── recover ───────────────────────────────────────────────────

#[test]
fn recover_before_initialize_is_rejected() {
    let (mut ctl, _bus, journal) = rig(&[]);
    assert_eq!(ctl.recover(), Err(BusError::NotConfigured));
    assert!(journal.ops().is_empty());
}

#[test]
fn recover_pulses_nine_times_then_reinstalls() {
    let (mut ctl, _bus, journal) = rig(&[]);
    let config = BusConfig::new(SCL, SDA, 400_000);
    ctl.initialize_with(config).unwrap();
    ctl.mark_locked();
    assert_eq!(ctl.state(), BusState::Locked);
    journal.clear();

    ctl.recover().unwrap();

    let mut expected = pulse_train();
    expected.extend([Op::Uninstall, Op::DelayMs(SETTLE_MS), Op::Install(config)]);
    assert_eq!(journal.ops(), expected);
    assert_eq!(ctl.state(), BusState::Ready);
}

#[test]
fn recover_after_failed_initialize_uses_remembered_config() {
    let (mut ctl, bus, journal) = rig(&[]);
    bus.fail_installs(1);
    let config = BusConfig { internal_pullups: false, ..BusConfig::new(SCL, SDA, 100_000) };
    assert!(ctl.initialize_with(config).is_err());
    journal.clear();

    ctl.recover().unwrap();

    assert_eq!(journal.ops().last(), Some(&Op::Install(config)));
    assert_eq!(ctl.state(), BusState::Ready);
}

#[test]
fn recover_with_failing_reinit_reports_error() {
    let (mut ctl, bus, journal) = rig(&[]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();
    bus.fail_installs(1);
    journal.clear();

    assert_eq!(ctl.recover(), Err(BusError::Init(PortError::Timeout)));
    assert_eq!(ctl.state(), BusState::Uninitialized);

    // The pulse train still ran in full.
    let writes = journal
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Write(SCL, LineLevel::Low)))
        .count();
    assert_eq!(writes, RECOVERY_PULSES as usize);
}

// ── bring_up ──────────────────────────────────────────────────

#[test]
fn bring_up_healthy_bus_skips_recovery() {
    let (mut ctl, _bus, journal) = rig(&[]);
    let config = BusConfig::new(SCL, SDA, 400_000);
    let mut events = RecordingEvents::default();

    assert_eq!(bus::bring_up(&mut ctl, &config, &mut events), BusState::Ready);
    assert_eq!(journal.ops(), vec![Op::Install(config)]);
    assert!(matches!(events.0.as_slice(), [AppEvent::BusReady { frequency_hz: 400_000 }]));
}

#[test]
fn bring_up_recovers_once_after_failed_install() {
    let (mut ctl, sim, journal) = rig(&[]);
    sim.fail_installs(1);
    let config = BusConfig::new(SCL, SDA, 400_000);
    let mut events = RecordingEvents::default();

    assert_eq!(bus::bring_up(&mut ctl, &config, &mut events), BusState::Ready);

    let mut expected = vec![Op::Install(config)];
    expected.extend(pulse_train());
    expected.extend([Op::Uninstall, Op::DelayMs(SETTLE_MS), Op::Install(config)]);
    assert_eq!(journal.ops(), expected);
    assert!(matches!(
        events.0.as_slice(),
        [
            AppEvent::BusInitFailed(BusError::Init(PortError::Timeout)),
            AppEvent::BusRecovered,
            AppEvent::BusReady { .. },
        ]
    ));
}

#[test]
fn bring_up_gives_up_after_one_recovery() {
    let (mut ctl, sim, journal) = rig(&[]);
    sim.fail_installs(2);
    let config = BusConfig::new(SCL, SDA, 400_000);
    let mut events = RecordingEvents::default();

    assert_eq!(bus::bring_up(&mut ctl, &config, &mut events), BusState::Uninitialized);

    let installs = journal.ops().iter().filter(|op| matches!(op, Op::Install(_))).count();
    assert_eq!(installs, 2);
    assert!(matches!(
        events.0.as_slice(),
        [AppEvent::BusInitFailed(_), AppEvent::BusInitFailed(BusError::Init(PortError::Timeout))]
    ));
    // A bus that never came up sees no scan traffic.
    assert!(ctl.probe_all_addresses().all(|r| !r.present));
    assert_eq!(sim.probes(), 0);
}

#[test]
fn bring_up_with_invalid_config_does_not_touch_lines() {
    let (mut ctl, _bus, journal) = rig(&[]);
    let mut events = RecordingEvents::default();

    let state = bus::bring_up(&mut ctl, &BusConfig::new(SCL, SCL, 400_000), &mut events);
    assert_eq!(state, BusState::Uninitialized);
    assert!(journal.ops().is_empty());
    assert!(matches!(
        events.0.as_slice(),
        [
            AppEvent::BusInitFailed(BusError::InvalidConfig(_)),
            AppEvent::BusInitFailed(BusError::NotConfigured),
        ]
    ));
}

// ── probe_all_addresses ───────────────────────────────────────

#[test]
fn scan_reports_exactly_the_responders() {
    let (mut ctl, bus, _journal) = rig(&[0x3C, 0x68]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();

    let results: Vec<_> = ctl.probe_all_addresses().collect();
    assert_eq!(results.len(), usize::from(MAX_ADDRESS) + 1);
    assert!(results.iter().enumerate().all(|(i, r)| usize::from(r.address) == i));

    let present: Vec<u8> = results.iter().filter(|r| r.present).map(|r| r.address).collect();
    assert_eq!(present, vec![0x3C, 0x68]);
    assert_eq!(bus.probes(), 128);
}

#[test]
fn scan_can_be_repeated() {
    let (mut ctl, _bus, _journal) = rig(&[0x3C]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();

    let first: Vec<_> = ctl.probe_all_addresses().collect();
    let second: Vec<_> = ctl.probe_all_addresses().collect();
    assert_eq!(first, second);
}

#[test]
fn scan_is_lazy_and_exact_size() {
    let (mut ctl, bus, _journal) = rig(&[0x3C]);
    ctl.initialize(SCL, SDA, 400_000).unwrap();

    let mut scan = ctl.probe_all_addresses();
    assert_eq!(scan.len(), 128);
    let hit = scan.find(|r| r.present).map(|r| r.address);
    assert_eq!(hit, Some(0x3C));
    assert_eq!(scan.len(), 128 - 0x3D);
    drop(scan);
    assert_eq!(bus.probes(), 0x3D);
}

#[test]
fn scan_without_driver_reports_all_absent() {
    let (mut ctl, bus, _journal) = rig(&[0x3C]);

    assert!(ctl.probe_all_addresses().all(|r| !r.present));
    assert_eq!(bus.probes(), 0);
}
