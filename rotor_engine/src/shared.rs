//! State shared between the control loop and the engine API.
//!
//! Every cell is a single atomic word and each has one designated writer:
//!
//! | Cell                          | Writer                                  |
//! |-------------------------------|-----------------------------------------|
//! | readings, commands, stall counts, status | control loop                 |
//! | targets, simulation mode      | engine API                              |
//! | control state                 | loop transitions (CAS) + API requests   |
//! | calibration bounds            | loop (sweep result) + API (store load, mode change) |
//!
//! The loop reads the control state once per cycle and commits with a
//! compare-exchange against the value it observed, so an API request that
//! lands mid-cycle is never overwritten.

use crate::calibration::CalibrationBounds;
use rotor_common::state::{Axis, ControlState, MotionCommand, SimulationMode};
use rotor_common::status::RotatorStatus;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};

/// Lock-free rotator state record.
#[derive(Debug)]
pub struct SharedState {
    state: AtomicU8,
    sim_mode: AtomicU8,
    mode_generation: AtomicU32,
    readings: [AtomicU16; 2],
    targets: [AtomicU16; 2],
    commands: [AtomicU8; 2],
    stall_counts: [AtomicU8; 2],
    status: AtomicU32,
    bounds: AtomicU64,
    bounds_valid: AtomicBool,
}

/// Point-in-time copy of [`SharedState`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Control state.
    pub state: ControlState,
    /// Simulation level.
    pub simulation_mode: SimulationMode,
    /// Readings `[az, el]`.
    pub readings: [u16; 2],
    /// Targets `[az, el]`.
    pub targets: [u16; 2],
    /// Motion commands `[az, el]`.
    pub commands: [MotionCommand; 2],
    /// Stall counters `[az, el]`.
    pub stall_counts: [u8; 2],
    /// Bounds, `None` while uncalibrated.
    pub bounds: Option<CalibrationBounds>,
    /// Status flags from the last cycle.
    pub status: RotatorStatus,
}

#[inline]
const fn idx(axis: Axis) -> usize {
    match axis {
        Axis::Azimuth => 0,
        Axis::Elevation => 1,
    }
}

impl SharedState {
    /// Fresh state in `Stopped` with the bounds implied by `mode`.
    pub fn new(mode: SimulationMode) -> Self {
        let shared = Self {
            state: AtomicU8::new(ControlState::Stopped as u8),
            sim_mode: AtomicU8::new(mode as u8),
            mode_generation: AtomicU32::new(0),
            readings: [AtomicU16::new(0), AtomicU16::new(0)],
            targets: [AtomicU16::new(0), AtomicU16::new(0)],
            commands: [AtomicU8::new(0), AtomicU8::new(0)],
            stall_counts: [AtomicU8::new(0), AtomicU8::new(0)],
            status: AtomicU32::new(0),
            bounds: AtomicU64::new(0),
            bounds_valid: AtomicBool::new(false),
        };
        shared.apply_mode_bounds(mode);
        shared
    }

    // ─── Control state ──────────────────────────────────────────────

    /// Current control state.
    #[inline]
    pub fn control_state(&self) -> ControlState {
        ControlState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(ControlState::ErrorSensor)
    }

    /// Loop commit: move from `observed` to `next` unless the API changed the state meanwhile.
    pub(crate) fn commit_state(&self, observed: ControlState, next: ControlState) -> bool {
        self.state
            .compare_exchange(observed as u8, next as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Request `Stopped`. Legal from any state.
    pub fn request_stop(&self) {
        self.state.store(ControlState::Stopped as u8, Ordering::Release);
    }

    /// Request a calibration sweep. Only `Stopped` and `Seeking` are replaced.
    ///
    /// Returns the state found, so callers can tell whether the request took.
    pub fn request_calibration(&self) -> ControlState {
        self.request_from_idle(ControlState::CalibrationStarting)
    }

    /// Request `Seeking` after new targets were written.
    ///
    /// # Errors
    /// Returns the state that blocked the request (calibrating or faulted).
    pub fn request_seek(&self) -> Result<(), ControlState> {
        let found = self.request_from_idle(ControlState::Seeking);
        if found.accepts_motion_request() { Ok(()) } else { Err(found) }
    }

    fn request_from_idle(&self, next: ControlState) -> ControlState {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let found = ControlState::from_u8(current).unwrap_or(ControlState::ErrorSensor);
            if !found.accepts_motion_request() {
                return found;
            }
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return found,
                Err(actual) => current = actual,
            }
        }
    }

    // ─── Loop-owned cells ───────────────────────────────────────────

    /// Latest reading of `axis`.
    #[inline]
    pub fn reading(&self, axis: Axis) -> u16 {
        self.readings[idx(axis)].load(Ordering::Acquire)
    }

    pub(crate) fn set_reading(&self, axis: Axis, value: u16) {
        self.readings[idx(axis)].store(value, Ordering::Release);
    }

    /// Current motion command of `axis`.
    #[inline]
    pub fn command(&self, axis: Axis) -> MotionCommand {
        MotionCommand::from_u8(self.commands[idx(axis)].load(Ordering::Acquire))
            .unwrap_or(MotionCommand::Idle)
    }

    pub(crate) fn set_command(&self, axis: Axis, command: MotionCommand) {
        self.commands[idx(axis)].store(command as u8, Ordering::Release);
    }

    /// Stall counter of `axis`.
    #[inline]
    pub fn stall_count(&self, axis: Axis) -> u8 {
        self.stall_counts[idx(axis)].load(Ordering::Acquire)
    }

    pub(crate) fn set_stall_count(&self, axis: Axis, count: u8) {
        self.stall_counts[idx(axis)].store(count, Ordering::Release);
    }

    /// Status flags published by the last cycle.
    pub fn status(&self) -> RotatorStatus {
        RotatorStatus::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: RotatorStatus) {
        self.status.store(status.bits(), Ordering::Release);
    }

    // ─── API-owned cells ────────────────────────────────────────────

    /// Target count of `axis`.
    #[inline]
    pub fn target(&self, axis: Axis) -> u16 {
        self.targets[idx(axis)].load(Ordering::Acquire)
    }

    /// Write the target count of `axis`. Takes effect once `Seeking` is requested.
    pub fn set_target(&self, axis: Axis, count: u16) {
        self.targets[idx(axis)].store(count, Ordering::Release);
    }

    /// Active simulation level.
    pub fn simulation_mode(&self) -> SimulationMode {
        SimulationMode::from_u8(self.sim_mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Bumped on every simulation level change.
    pub fn mode_generation(&self) -> u32 {
        self.mode_generation.load(Ordering::Acquire)
    }

    /// Switch simulation level.
    ///
    /// Reseeds or invalidates the bounds, zeroes targets and forces
    /// `Stopped`. Readings, commands and counters are loop-owned; the loop
    /// resets them when it sees the new generation.
    pub fn set_simulation_mode(&self, mode: SimulationMode) {
        self.stop_for_mode_change(mode);
        self.publish_mode(mode);
    }

    /// First half of a level change: stop, reseed bounds, clear targets.
    ///
    /// Must precede [`publish_mode`](Self::publish_mode) so no cycle runs
    /// the new level while a motion state from the old one is still set.
    pub(crate) fn stop_for_mode_change(&self, mode: SimulationMode) {
        self.request_stop();
        self.apply_mode_bounds(mode);
        for target in &self.targets {
            target.store(0, Ordering::Release);
        }
    }

    /// Second half of a level change: make it visible to the loop.
    pub(crate) fn publish_mode(&self, mode: SimulationMode) {
        self.sim_mode.store(mode as u8, Ordering::Release);
        self.mode_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Synthetic bounds for simulated levels, none for real hardware.
    pub(crate) fn apply_mode_bounds(&self, mode: SimulationMode) {
        match mode.synthetic_bounds() {
            Some(bounds) => self.publish_bounds(CalibrationBounds::from(bounds)),
            None => self.invalidate_bounds(),
        }
    }

    // ─── Calibration bounds ─────────────────────────────────────────

    /// Bounds, or `None` while uncalibrated.
    pub fn bounds(&self) -> Option<CalibrationBounds> {
        if self.bounds_valid.load(Ordering::Acquire) {
            Some(CalibrationBounds::unpack(self.bounds.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    /// Publish bounds and mark them valid.
    pub fn publish_bounds(&self, bounds: CalibrationBounds) {
        self.bounds.store(bounds.pack(), Ordering::Release);
        self.bounds_valid.store(true, Ordering::Release);
    }

    /// Clear the validity flag.
    pub fn invalidate_bounds(&self) {
        self.bounds_valid.store(false, Ordering::Release);
    }

    /// Copy every cell.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.control_state(),
            simulation_mode: self.simulation_mode(),
            readings: Axis::ALL.map(|a| self.reading(a)),
            targets: Axis::ALL.map(|a| self.target(a)),
            commands: Axis::ALL.map(|a| self.command(a)),
            stall_counts: Axis::ALL.map(|a| self.stall_count(a)),
            bounds: self.bounds(),
            status: self.status(),
        }
    }
}
