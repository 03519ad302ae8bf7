//! End-to-end engine tests.
//!
//! Most tests step the control loop by hand over a bench rig or the
//! simulator so every transition is deterministic; one runs the loop on
//! its own thread.

use rotor_common::config::RotatorConfig;
use rotor_common::error::RotatorError;
use rotor_common::hal::transport::PinLevel;
use rotor_common::state::{Axis, ControlState, Direction, MotionCommand, SimulationMode};
use rotor_common::status::RotatorStatus;
use rotor_engine::{CalibrationBounds, CalibrationStore, ControlLoop, Engine};
use rotor_hal::{BenchHandle, BenchRig, NoHardware, RigSpec, TransportRegistry};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const RIG_BOUNDS: CalibrationBounds = CalibrationBounds::new(120, 1880, 90, 1710);

fn config_in(dir: &TempDir, simulator: Option<u8>) -> RotatorConfig {
    let mut config = RotatorConfig::default();
    config.engine.calibration_file = cal_path(dir);
    config.engine.simulator = simulator;
    config
}

fn cal_path(dir: &TempDir) -> PathBuf {
    dir.path().join("g5500_cal.txt")
}

fn store_calibration(dir: &TempDir, bounds: CalibrationBounds) {
    CalibrationStore::new(Some(cal_path(dir)), 1000).save(&bounds).unwrap();
}

fn bench_engine(dir: &TempDir, spec: RigSpec) -> (Engine, ControlLoop, BenchHandle) {
    let rig = BenchRig::new(spec);
    let bench = rig.handle();
    let (engine, control) = Engine::with_manual_loop(&config_in(dir, Some(0)), Box::new(rig)).unwrap();
    (engine, control, bench)
}

fn simulated_engine(dir: &TempDir, level: u8) -> (Engine, ControlLoop) {
    Engine::with_manual_loop(&config_in(dir, Some(level)), Box::new(NoHardware)).unwrap()
}

fn run(control: &mut ControlLoop, cycles: usize) {
    for _ in 0..cycles {
        control.cycle();
    }
}

fn assert_near(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

// ─── Calibration ────────────────────────────────────────────────────

#[test]
fn test_calibration_sweep_on_bench_rig() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());
    assert!(bench.is_initialized());

    assert_eq!(engine.get_position(), Err(RotatorError::Calibrating));
    assert_eq!(engine.control_state(), ControlState::CalibrationStarting);

    let mut states = vec![engine.control_state()];
    for _ in 0..500 {
        control.cycle();
        let state = engine.control_state();
        if states.last() != Some(&state) {
            states.push(state);
        }
        if state == ControlState::Stopped {
            break;
        }
        assert!(engine.status().contains(RotatorStatus::BUSY));
    }
    assert_eq!(
        states,
        vec![
            ControlState::CalibrationStarting,
            ControlState::CalibrationSeekingMins,
            ControlState::CalibrationSeekingMaxes,
            ControlState::Stopped,
        ]
    );

    assert!(!bench.any_relay_active());
    assert_eq!(engine.snapshot().bounds, Some(RIG_BOUNDS));
    let saved = CalibrationStore::new(Some(cal_path(&dir)), 1000).load().unwrap();
    assert_eq!(saved, RIG_BOUNDS);

    // Parked against the cw and up stops.
    let (az, el) = engine.get_position().unwrap();
    assert_near(az, 450.0, 1e-9);
    assert_near(el, 180.0, 1e-9);
    let status = engine.status();
    assert!(status.contains(RotatorStatus::LIMIT_RIGHT | RotatorStatus::LIMIT_UP | RotatorStatus::OVERLAP_RIGHT));
    assert!(!status.contains(RotatorStatus::BUSY));
}

#[test]
fn test_stored_calibration_skips_sweep() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, _bench) = bench_engine(&dir, RigSpec::default());
    control.cycle();

    let (az, el) = engine.get_position().unwrap();
    assert_near(az, 225.0, 1e-9);
    assert_near(el, 510.0 / 1620.0 * 180.0, 1e-9);
    assert_eq!(engine.control_state(), ControlState::Stopped);
}

#[test]
fn test_implausible_sweep_is_sensor_fault() {
    let dir = tempfile::tempdir().unwrap();
    let spec = RigSpec {
        az_stops: (500, 1200),
        ..RigSpec::default()
    };
    let (engine, mut control, bench) = bench_engine(&dir, spec);

    assert_eq!(engine.get_position(), Err(RotatorError::Calibrating));
    for _ in 0..500 {
        control.cycle();
        if engine.control_state().is_error() {
            break;
        }
    }
    assert_eq!(engine.control_state(), ControlState::ErrorSensor);
    assert!(!bench.any_relay_active());
    assert_eq!(engine.snapshot().bounds, None);
    assert!(!cal_path(&dir).exists());

    assert_eq!(engine.get_position(), Err(RotatorError::SensorFault));
    assert_eq!(engine.set_position(90.0, 45.0), Err(RotatorError::SensorFault));
    assert_eq!(engine.control_state(), ControlState::Stopped);
    // Still uncalibrated: the next request starts a new sweep.
    assert_eq!(engine.set_position(90.0, 45.0), Err(RotatorError::Calibrating));
    assert_eq!(engine.control_state(), ControlState::CalibrationStarting);
}

#[test]
fn test_stop_aborts_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    assert_eq!(engine.park(), Err(RotatorError::Calibrating));
    run(&mut control, 3);
    assert_eq!(engine.control_state(), ControlState::CalibrationSeekingMins);
    assert!(bench.any_relay_active());

    engine.stop();
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::Stopped);
    assert!(!bench.any_relay_active());
    assert_eq!(engine.snapshot().bounds, None);
}

#[test]
fn test_query_mid_sweep_does_not_restart_it() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control, _bench) = bench_engine(&dir, RigSpec::default());

    assert_eq!(engine.get_position(), Err(RotatorError::Calibrating));
    control.cycle();
    // A second query mid-sweep does not restart it.
    assert_eq!(engine.get_position(), Err(RotatorError::Calibrating));
    assert_eq!(engine.control_state(), ControlState::CalibrationSeekingMins);
}

// ─── Seeking ────────────────────────────────────────────────────────

#[test]
fn test_seek_on_bench_rig() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    engine.set_position(90.0, 135.0).unwrap();
    assert_eq!(engine.control_state(), ControlState::Seeking);
    control.cycle();
    assert_eq!(bench.drive(Axis::Azimuth), -1);
    assert_eq!(bench.drive(Axis::Elevation), 1);
    assert!(engine.status().contains(RotatorStatus::BUSY | RotatorStatus::MOVING_LEFT | RotatorStatus::MOVING_UP));

    run(&mut control, 60);
    assert_eq!(engine.control_state(), ControlState::Seeking);
    assert!(!bench.any_relay_active());
    assert!(!engine.status().contains(RotatorStatus::BUSY));

    let (az, el) = engine.get_position().unwrap();
    // Overshoot is at most one rig sample past the target.
    assert_near(az, 90.0, 40.0 * 450.0 / 1760.0);
    assert_near(el, 135.0, 30.0 * 180.0 / 1620.0);
}

#[test]
fn test_seek_within_deadband_does_not_move() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());
    control.cycle();
    let (az, el) = engine.get_position().unwrap();

    // 10 degrees of azimuth is about 39 counts, inside the 50 count deadband.
    engine.set_position(az + 10.0, el).unwrap();
    run(&mut control, 5);
    assert_eq!(bench.position(), (1000, 600));
    assert_eq!(bench.relay(25), Some(PinLevel::Idle));

    engine.set_position(az + 15.0, el).unwrap();
    control.cycle();
    assert_eq!(bench.drive(Axis::Azimuth), 1);
    run(&mut control, 5);
    assert!(!bench.any_relay_active());
    assert!(bench.position().0 >= 1059);
}

#[test]
fn test_relay_interlock_never_closes_both() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());
    let hw = RotatorConfig::default().hardware;

    engine.move_direction(Direction::Right).unwrap();
    run(&mut control, 3);
    engine.move_direction(Direction::Left).unwrap();
    for _ in 0..30 {
        control.cycle();
        let both = bench.relay(hw.pin_az_cw) == Some(PinLevel::Active)
            && bench.relay(hw.pin_az_ccw) == Some(PinLevel::Active);
        assert!(!both);
    }
}

#[test]
fn test_move_and_park_targets() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _control) = simulated_engine(&dir, 3);

    engine.move_direction(Direction::Right).unwrap();
    engine.move_code(Direction::CODE_UP).unwrap();
    assert_eq!(engine.get_target().unwrap(), (450.0, 180.0));
    assert_eq!(engine.control_state(), ControlState::Seeking);

    engine.move_code(Direction::CODE_LEFT).unwrap();
    assert_eq!(engine.get_target().unwrap(), (0.0, 180.0));

    engine.park().unwrap();
    assert_eq!(engine.get_target().unwrap(), (0.0, 0.0));

    assert!(matches!(engine.move_code(0), Err(RotatorError::InvalidArgument(_))));
}

// ─── Faults ─────────────────────────────────────────────────────────

#[test]
fn test_power_loss_is_sticky_until_motion_request() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    engine.set_position(300.0, 20.0).unwrap();
    run(&mut control, 2);
    assert!(bench.any_relay_active());

    bench.set_powered(false);
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::ErrorNoPower);
    assert!(!bench.any_relay_active());

    bench.set_powered(true);
    run(&mut control, 3);
    assert_eq!(engine.get_position(), Err(RotatorError::PowerFault));
    assert_eq!(engine.get_position(), Err(RotatorError::PowerFault));
    assert_eq!(engine.control_state(), ControlState::ErrorNoPower);

    assert_eq!(engine.set_position(300.0, 20.0), Err(RotatorError::PowerFault));
    assert_eq!(engine.control_state(), ControlState::Stopped);
    engine.set_position(300.0, 20.0).unwrap();
    control.cycle();
    assert!(bench.any_relay_active());
}

#[test]
fn test_jammed_axis_stalls() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    bench.jam(Axis::Azimuth, true);
    engine.set_position(300.0, 0.0).unwrap();
    for _ in 0..10 {
        control.cycle();
        if engine.control_state() == ControlState::ErrorStalled {
            break;
        }
    }
    assert_eq!(engine.control_state(), ControlState::ErrorStalled);
    control.cycle();
    assert!(!bench.any_relay_active());
    assert_eq!(engine.get_position(), Err(RotatorError::Stalled));

    // Idle axes never accumulate stall counts.
    bench.jam(Axis::Azimuth, false);
    assert_eq!(engine.set_position(300.0, 0.0), Err(RotatorError::Stalled));
    run(&mut control, 5);
    let snap = engine.snapshot();
    assert_eq!(snap.state, ControlState::Stopped);
    assert_eq!(snap.stall_counts, [0, 0]);
    assert_eq!(snap.commands, [MotionCommand::Idle; 2]);
}

#[test]
fn test_read_failure_is_sensor_fault() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());
    control.cycle();

    bench.fail_reads(true);
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::ErrorSensor);
    bench.fail_reads(false);
    control.cycle();
    assert_eq!(engine.get_position(), Err(RotatorError::SensorFault));

    assert_eq!(engine.park(), Err(RotatorError::SensorFault));
    engine.park().unwrap();
}

#[test]
fn test_relay_write_failure_is_sensor_fault() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    bench.fail_writes(true);
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::ErrorSensor);
}

#[test]
fn test_no_hardware_live_mode_faults() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control) = Engine::with_manual_loop(&config_in(&dir, None), Box::new(NoHardware)).unwrap();
    assert_eq!(engine.get_simulation_mode(), SimulationMode::Elevation180);

    engine.set_simulation_mode(0).unwrap();
    assert_eq!(engine.get_position(), Err(RotatorError::Calibrating));
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::ErrorSensor);
    assert_eq!(engine.get_position(), Err(RotatorError::SensorFault));
}

#[test]
fn test_invalid_argument_uncalibrated_starts_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control, _bench) = bench_engine(&dir, RigSpec::default());

    assert_eq!(engine.set_position(500.0, 0.0), Err(RotatorError::Calibrating));
    assert_eq!(engine.control_state(), ControlState::CalibrationStarting);
    control.cycle();
    assert_eq!(engine.move_code(3), Err(RotatorError::Calibrating));
    assert_eq!(engine.control_state(), ControlState::CalibrationSeekingMins);
}

#[test]
fn test_invalid_argument_reports_and_clears_fault() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    bench.set_powered(false);
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::ErrorNoPower);
    bench.set_powered(true);

    assert_eq!(engine.set_position(500.0, 0.0), Err(RotatorError::PowerFault));
    assert_eq!(engine.control_state(), ControlState::Stopped);
    assert!(matches!(engine.set_position(500.0, 0.0), Err(RotatorError::InvalidArgument(_))));
    assert!(matches!(engine.set_position(0.0, -5.0), Err(RotatorError::InvalidArgument(_))));
    control.cycle();
    assert_eq!(engine.control_state(), ControlState::Stopped);
    assert!(!bench.any_relay_active());
}

#[test]
fn test_move_clears_reported_fault() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let (engine, mut control, bench) = bench_engine(&dir, RigSpec::default());

    bench.fail_reads(true);
    control.cycle();
    bench.fail_reads(false);
    control.cycle();
    assert_eq!(engine.get_position(), Err(RotatorError::SensorFault));
    assert_eq!(engine.control_state(), ControlState::ErrorSensor);

    assert_eq!(engine.move_direction(Direction::Up), Err(RotatorError::SensorFault));
    assert_eq!(engine.control_state(), ControlState::Stopped);
    engine.move_direction(Direction::Up).unwrap();
    assert_eq!(engine.control_state(), ControlState::Seeking);
    control.cycle();
    assert_eq!(bench.drive(Axis::Elevation), 1);
}

// ─── Simulation ─────────────────────────────────────────────────────

#[test]
fn test_simulated_seek_converges() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control) = simulated_engine(&dir, 3);

    engine.set_position(45.0, 90.0).unwrap();
    control.cycle();
    assert!(engine.status().contains(RotatorStatus::BUSY | RotatorStatus::MOVING));

    run(&mut control, 120);
    let snap = engine.snapshot();
    assert_eq!(snap.state, ControlState::Seeking);
    assert_eq!(snap.commands, [MotionCommand::Idle; 2]);
    let (az, el) = engine.get_position().unwrap();
    assert_near(az, 45.0, 2.5);
    assert_near(el, 90.0, 1.0);
    assert!(!cal_path(&dir).exists());
}

#[test]
fn test_azimuth_only_pins_elevation() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control) = simulated_engine(&dir, 1);
    assert_eq!(engine.capabilities().max_el, 0.0);

    engine.set_position(90.0, 45.0).unwrap();
    assert_eq!(engine.get_target().unwrap().1, 0.0);
    run(&mut control, 60);
    let (az, el) = engine.get_position().unwrap();
    assert_near(az, 90.0, 2.5);
    assert_eq!(el, 0.0);
    assert_eq!(engine.snapshot().readings[1], 0);
}

#[test]
fn test_simulation_change_resets_motion() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut control) = simulated_engine(&dir, 3);

    engine.set_position(100.0, 50.0).unwrap();
    run(&mut control, 10);
    assert_ne!(engine.snapshot().readings, [0, 0]);

    engine.set_simulation_mode(2).unwrap();
    assert_eq!(engine.control_state(), ControlState::Stopped);
    control.cycle();
    let snap = engine.snapshot();
    assert_eq!(snap.simulation_mode, SimulationMode::Elevation90);
    assert_eq!(snap.readings, [0, 0]);
    assert_eq!(snap.targets, [0, 0]);
    assert_eq!(snap.commands, [MotionCommand::Idle; 2]);
    assert_eq!(engine.get_position().unwrap(), (0.0, 0.0));
    assert_eq!(engine.capabilities().max_el, 90.0);
    assert!(matches!(engine.set_position(0.0, 100.0), Err(RotatorError::InvalidArgument(_))));
    engine.set_position(0.0, 90.0).unwrap();
}

// ─── Threaded ───────────────────────────────────────────────────────

#[test]
fn test_threaded_engine_reaches_target() {
    let dir = tempfile::tempdir().unwrap();
    store_calibration(&dir, RIG_BOUNDS);
    let mut config = config_in(&dir, Some(0));
    config.engine.poll_period_ms = 5;
    config.hardware.transport = "bench".to_string();
    let engine = Engine::initialize(&config, &TransportRegistry::with_builtin()).unwrap();

    engine.set_position(300.0, 120.0).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let (az, el) = engine.get_position().unwrap();
        let idle = engine.snapshot().commands == [MotionCommand::Idle; 2];
        if idle && (az - 300.0).abs() < 11.0 && (el - 120.0).abs() < 4.0 {
            break;
        }
        assert!(Instant::now() < deadline, "rotator did not reach target: ({az}, {el})");
        thread::sleep(Duration::from_millis(10));
    }

    let stats = engine.shutdown().unwrap();
    assert!(stats.cycle_count > 0);
}

#[test]
fn test_initialize_without_hardware() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir, None);
    config.hardware.transport = "none".to_string();
    let engine = Engine::initialize(&config, &TransportRegistry::with_builtin()).unwrap();

    assert_eq!(engine.get_simulation_mode(), SimulationMode::Elevation180);
    let caps = engine.capabilities();
    assert_eq!((caps.min_az, caps.max_az, caps.min_el, caps.max_el), (0.0, 450.0, 0.0, 180.0));
    assert!(engine.shutdown().is_some());
}
