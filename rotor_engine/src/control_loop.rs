//! Control loop.
//!
//! The only code that touches the transport. Each cycle it refreshes the
//! readings, updates the stall counters, runs the state transition,
//! drives the relays and publishes status, then sleeps out the rest of
//! the poll period.

use crate::calibration::CalibrationStore;
use crate::converter::Converter;
use crate::detector::{StallDetector, StatusInputs, status_flags};
use crate::kinematics::SimKinematics;
use crate::machine::{self, Capture, CycleInputs};
use crate::shared::SharedState;
use rotor_common::config::{RotatorConfig, SimulationConfig};
use rotor_common::error::RotatorError;
use rotor_common::hal::transport::{PinLevel, Transport, TransportError};
use rotor_common::state::{Axis, ControlState, MotionCommand, SimulationMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Cycles between periodic statistics lines (one minute at the default period).
const STATS_LOG_INTERVAL: u64 = 300;

/// Timing statistics of the loop thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles executed.
    pub cycle_count: u64,
    /// Cycles that took longer than the poll period.
    pub overruns: u64,
    /// Longest cycle [us].
    pub max_cycle_us: u64,
    /// Sum of cycle times [us].
    pub total_cycle_us: u64,
}

impl CycleStats {
    /// Record one cycle. Returns true on overrun.
    pub fn record(&mut self, cycle_us: u64, period_us: u64) -> bool {
        self.cycle_count += 1;
        self.total_cycle_us += cycle_us;
        self.max_cycle_us = self.max_cycle_us.max(cycle_us);
        let overrun = cycle_us > period_us;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    /// Average cycle time [us], 0 before the first cycle.
    pub fn avg_cycle_us(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.total_cycle_us / self.cycle_count
        }
    }
}

/// Why a live read aborted.
#[derive(Debug)]
enum ReadFault {
    Sensor(TransportError),
    NoPower(u16),
}

impl ReadFault {
    const fn state(&self) -> ControlState {
        match self {
            Self::Sensor(_) => ControlState::ErrorSensor,
            Self::NoPower(_) => ControlState::ErrorNoPower,
        }
    }
}

/// Motion-start grace period bound to the calibration phase that started it.
#[derive(Debug, Clone, Copy)]
struct Grace {
    phase: ControlState,
    remaining: u32,
}

/// Controller wiring the loop needs each cycle.
#[derive(Debug, Clone, Copy)]
struct Wiring {
    /// Relay pins: az cw, az ccw, el up, el down.
    pins: [u8; 4],
    /// ADC channels: az, el, power.
    channels: [u8; 3],
    power_ok_min: u16,
}

/// The control loop and everything it owns.
pub struct ControlLoop {
    shared: Arc<SharedState>,
    transport: Box<dyn Transport>,
    store: CalibrationStore,
    wiring: Wiring,
    simulation: SimulationConfig,
    period: Duration,
    grace_cycles: u32,
    detector: StallDetector,
    deadbands: [u16; 2],
    min_span: u16,
    mode: SimulationMode,
    mode_generation: u32,
    kinematics: Option<SimKinematics>,
    previous: [u16; 2],
    grace: Option<Grace>,
    recorded_mins: [u16; 2],
    running: Arc<AtomicBool>,
    stats: CycleStats,
}

impl ControlLoop {
    /// Build a loop over an already prepared transport.
    pub fn new(
        shared: Arc<SharedState>,
        transport: Box<dyn Transport>,
        store: CalibrationStore,
        config: &RotatorConfig,
    ) -> Self {
        let engine = &config.engine;
        let hw = &config.hardware;
        let mode = shared.simulation_mode();
        let period = engine.poll_period();
        Self {
            mode_generation: shared.mode_generation(),
            shared,
            transport,
            store,
            wiring: Wiring {
                pins: hw.relay_pins(),
                channels: [hw.az_channel, hw.el_channel, hw.power_channel],
                power_ok_min: hw.power_ok_min,
            },
            simulation: config.simulation.clone(),
            period,
            grace_cycles: engine.grace_cycles(),
            detector: StallDetector::new(engine.stall_threshold),
            deadbands: [engine.az_deadband, engine.el_deadband],
            min_span: engine.min_calibration_span,
            mode,
            kinematics: SimKinematics::new(mode, &config.simulation, period),
            previous: [0; 2],
            grace: None,
            recorded_mins: [0; 2],
            running: Arc::new(AtomicBool::new(true)),
            stats: CycleStats::default(),
        }
    }

    /// Shared state this loop drives.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Timing statistics so far.
    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Flag that keeps [`run`](Self::run) going; clear it to stop the loop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Execute one control cycle without sleeping.
    pub fn cycle(&mut self) {
        self.sync_mode();

        let observed = self.shared.control_state();
        let fault = match self.refresh_readings() {
            Ok(()) => None,
            Err(fault) => {
                if fault.state() != observed {
                    match &fault {
                        ReadFault::Sensor(e) => warn!(error = %e, "Sensor read failed"),
                        ReadFault::NoPower(power) => warn!(
                            power = *power,
                            min = self.wiring.power_ok_min,
                            "Rotator controller has no power"
                        ),
                    }
                }
                Some(fault.state())
            }
        };
        let state = fault.unwrap_or(observed);
        let readings = Axis::ALL.map(|axis| self.shared.reading(axis));
        let commands = Axis::ALL.map(|axis| self.shared.command(axis));

        if self.grace.is_some_and(|grace| grace.phase != state) {
            self.grace = None;
        }
        let grace_active = self.grace.is_some();

        let mut stalled = [false; 2];
        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            let count = if grace_active {
                0
            } else {
                self.detector.update(
                    self.shared.stall_count(axis),
                    commands[i],
                    self.previous[i],
                    readings[i],
                )
            };
            self.shared.set_stall_count(axis, count);
            stalled[i] = self.detector.is_stalled(count);
        }
        self.previous = readings;

        let targets = Axis::ALL.map(|axis| self.shared.target(axis));
        let transition = machine::step(&CycleInputs {
            state,
            readings,
            targets,
            commands,
            stalled,
            deadbands: self.deadbands,
            grace_active,
            recorded_mins: self.recorded_mins,
            min_calibration_span: self.min_span,
        });

        let mut next = transition.next;
        if let Err(e) = self.apply_commands(transition.commands) {
            if state != ControlState::ErrorSensor {
                warn!(error = %e, "Relay write failed");
            }
            if !next.is_error() {
                next = ControlState::ErrorSensor;
            }
        }

        if transition.start_grace {
            self.grace = Some(Grace {
                phase: next,
                remaining: self.grace_cycles,
            });
        } else if let Some(grace) = self.grace.as_mut() {
            grace.remaining = grace.remaining.saturating_sub(1);
            if grace.remaining == 0 {
                self.grace = None;
            }
        }

        if self.shared.commit_state(observed, next) {
            if next != observed {
                debug!(from = ?observed, to = ?next, "Control state transition");
            }
            if let Some(capture) = transition.capture {
                self.apply_capture(capture);
            }
        } else {
            debug!(
                observed = ?observed,
                requested = ?self.shared.control_state(),
                "Control state changed by request during cycle"
            );
            self.grace = None;
        }

        self.publish_status(readings);

        trace!(
            state = ?next,
            az = readings[0],
            az_target = targets[0],
            az_cmd = ?transition.commands[0],
            az_n = self.shared.stall_count(Axis::Azimuth),
            el = readings[1],
            el_target = targets[1],
            el_cmd = ?transition.commands[1],
            el_n = self.shared.stall_count(Axis::Elevation),
            "Control cycle"
        );
    }

    /// Run cycles at the poll period until the running flag is cleared, then release the hardware.
    pub fn run(&mut self) {
        info!(
            period_ms = self.period.as_millis() as u64,
            transport = self.transport.name(),
            simulation = %self.mode,
            "Control loop started"
        );
        let period_us = self.period.as_micros() as u64;

        while self.running.load(Ordering::Acquire) {
            let cycle_start = Instant::now();
            self.cycle();

            let elapsed = cycle_start.elapsed();
            if self.stats.record(elapsed.as_micros() as u64, period_us) {
                let overruns = self.stats.overruns;
                if overruns <= 10 || overruns % 1000 == 0 {
                    warn!(
                        overruns,
                        cycle_us = elapsed.as_micros() as u64,
                        period_us,
                        "Control cycle overran its period"
                    );
                }
            }
            if self.stats.cycle_count % STATS_LOG_INTERVAL == 0 {
                debug!(
                    cycles = self.stats.cycle_count,
                    avg_us = self.stats.avg_cycle_us(),
                    max_us = self.stats.max_cycle_us,
                    overruns = self.stats.overruns,
                    "Control loop statistics"
                );
            }

            if elapsed < self.period {
                thread::sleep(self.period - elapsed);
            }
        }

        self.shutdown();
    }

    /// Move the loop onto its own thread.
    ///
    /// # Errors
    /// Returns `RotatorError::Internal` if the thread cannot be spawned.
    pub fn spawn(self) -> Result<ControlLoopHandle, RotatorError> {
        let running = self.running_flag();
        let mut control = self;
        let thread = thread::Builder::new()
            .name("rotor-control".to_string())
            .spawn(move || {
                control.run();
                control.stats
            })
            .map_err(|e| RotatorError::Internal(format!("spawn control loop: {e}")))?;
        Ok(ControlLoopHandle {
            running,
            thread: Some(thread),
        })
    }

    /// Idle the relays and release the transport.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.apply_commands([MotionCommand::Idle; 2]) {
            warn!(error = %e, "Failed to idle relays on shutdown");
        }
        if let Err(e) = self.transport.shutdown() {
            warn!(error = %e, "Transport shutdown failed");
        }
        info!(
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            "Control loop stopped"
        );
    }

    // ─── Cycle steps ────────────────────────────────────────────────

    /// Pick up a simulation level change made through the API.
    fn sync_mode(&mut self) {
        let generation = self.shared.mode_generation();
        if generation == self.mode_generation {
            return;
        }
        self.mode_generation = generation;
        let previous = self.mode;

        if !previous.is_simulated() {
            if let Err(e) = self.apply_commands([MotionCommand::Idle; 2]) {
                warn!(error = %e, "Failed to idle relays on simulation change");
            }
        }

        self.mode = self.shared.simulation_mode();
        if self.mode.is_simulated() {
            // A sweep may have published measured bounds after the API reseeded them.
            self.shared.apply_mode_bounds(self.mode);
        }
        for axis in Axis::ALL {
            self.shared.set_reading(axis, 0);
            self.shared.set_command(axis, MotionCommand::Idle);
            self.shared.set_stall_count(axis, 0);
        }
        self.previous = [0; 2];
        self.grace = None;
        self.recorded_mins = [0; 2];
        self.kinematics = SimKinematics::new(self.mode, &self.simulation, self.period);
        info!(from = %previous, to = %self.mode, "Simulation level changed");
    }

    fn refresh_readings(&mut self) -> Result<(), ReadFault> {
        let Some(model) = self.kinematics else {
            return self.read_live();
        };
        for axis in Axis::ALL {
            let next = model.advance(axis, self.shared.reading(axis), self.shared.command(axis));
            self.shared.set_reading(axis, next);
        }
        Ok(())
    }

    /// Power sense first, then azimuth, then elevation. Stops at the first failure.
    fn read_live(&mut self) -> Result<(), ReadFault> {
        let [az_channel, el_channel, power_channel] = self.wiring.channels;
        let power = self
            .transport
            .read_adc_channel(power_channel)
            .map_err(ReadFault::Sensor)?;
        if power < self.wiring.power_ok_min {
            return Err(ReadFault::NoPower(power));
        }
        for (axis, channel) in [(Axis::Azimuth, az_channel), (Axis::Elevation, el_channel)] {
            let value = self
                .transport
                .read_adc_channel(channel)
                .map_err(ReadFault::Sensor)?;
            self.shared.set_reading(axis, value);
        }
        Ok(())
    }

    /// Publish commands and, on real hardware, drive the relays to match.
    fn apply_commands(&mut self, commands: [MotionCommand; 2]) -> Result<(), TransportError> {
        for (axis, command) in Axis::ALL.into_iter().zip(commands) {
            self.shared.set_command(axis, command);
        }
        if self.mode.is_simulated() {
            return Ok(());
        }
        let [az_cw, az_ccw, el_up, el_down] = self.wiring.pins;
        for (command, positive, negative) in [
            (commands[0], az_cw, az_ccw),
            (commands[1], el_up, el_down),
        ] {
            // Release before engage so opposing relays never close together.
            match command {
                MotionCommand::Positive => {
                    self.transport.set_output_pin(negative, PinLevel::Idle)?;
                    self.transport.set_output_pin(positive, PinLevel::Active)?;
                }
                MotionCommand::Negative => {
                    self.transport.set_output_pin(positive, PinLevel::Idle)?;
                    self.transport.set_output_pin(negative, PinLevel::Active)?;
                }
                MotionCommand::Idle => {
                    self.transport.set_output_pin(positive, PinLevel::Idle)?;
                    self.transport.set_output_pin(negative, PinLevel::Idle)?;
                }
            }
        }
        Ok(())
    }

    fn apply_capture(&mut self, capture: Capture) {
        match capture {
            Capture::Mins(mins) => {
                self.recorded_mins = mins;
                info!(az_min = mins[0], el_min = mins[1], "Calibration minimums found, seeking maximums");
            }
            Capture::Bounds(bounds) => {
                self.shared.publish_bounds(bounds);
                info!(%bounds, "Calibration complete");
                if let Err(e) = self.store.save(&bounds) {
                    warn!(error = %e, "Calibration not saved, keeping it for this session only");
                }
            }
            Capture::Rejected(bounds) => {
                error!(%bounds, min_span = self.min_span, "Calibration sweep span implausible, discarded");
            }
        }
    }

    fn publish_status(&self, readings: [u16; 2]) {
        let bounds = self.shared.bounds();
        let converter = Converter::new(bounds, self.mode);
        let status = status_flags(&StatusInputs {
            state: self.shared.control_state(),
            commands: Axis::ALL.map(|axis| self.shared.command(axis)),
            readings,
            deadbands: self.deadbands,
            bounds,
            az_degrees: converter.to_degrees(Axis::Azimuth, readings[0]),
        });
        self.shared.set_status(status);
    }
}

/// Handle to a control loop running on its own thread.
///
/// Dropping the handle stops and joins the loop.
#[derive(Debug)]
pub struct ControlLoopHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<CycleStats>>,
}

impl ControlLoopHandle {
    /// True until the loop thread has exited.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop, wait for it to idle the relays and return its statistics.
    pub fn stop(mut self) -> Option<CycleStats> {
        self.halt()
    }

    fn halt(&mut self) -> Option<CycleStats> {
        self.running.store(false, Ordering::Release);
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Control loop thread panicked");
                None
            }
        }
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
