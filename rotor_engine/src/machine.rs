//! Control state transitions.
//!
//! One pure function per state, each taking the cycle's inputs and
//! returning the next state plus the motion commands to apply. The loop
//! owns all side effects.
//!
//! ```text
//! Stopped ◄──────────────────────────────────────────────┐
//!   │ ▲ (API)                                            │
//!   ▼ │                                                  │
//! Seeking ──stall──► ErrorStalled                        │
//!                                                        │
//! CalibrationStarting ─► CalibrationSeekingMins ─► CalibrationSeekingMaxes
//!                            (both stalled)             (both stalled)
//! any cycle: power low ─► ErrorNoPower, read/write failure ─► ErrorSensor
//! ```

use crate::calibration::CalibrationBounds;
use rotor_common::state::{ControlState, MotionCommand};

/// Everything a transition depends on, gathered by the loop once per cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs {
    /// State to act on this cycle.
    pub state: ControlState,
    /// Fresh readings `[az, el]`.
    pub readings: [u16; 2],
    /// Targets `[az, el]`.
    pub targets: [u16; 2],
    /// Commands in force before this cycle `[az, el]`.
    pub commands: [MotionCommand; 2],
    /// Stall verdict `[az, el]`.
    pub stalled: [bool; 2],
    /// Seek deadbands `[az, el]`.
    pub deadbands: [u16; 2],
    /// Motion-start grace period still running.
    pub grace_active: bool,
    /// Minimum readings recorded by the sweep's first phase `[az, el]`.
    pub recorded_mins: [u16; 2],
    /// Minimum plausible span per axis.
    pub min_calibration_span: u16,
}

/// Data captured by a calibration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Both minimum end-stops reached at these readings `[az, el]`.
    Mins([u16; 2]),
    /// Sweep complete with plausible bounds.
    Bounds(CalibrationBounds),
    /// Sweep complete but the span is implausible.
    Rejected(CalibrationBounds),
}

/// Result of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State to commit.
    pub next: ControlState,
    /// Commands to apply `[az, el]`.
    pub commands: [MotionCommand; 2],
    /// Start the motion-start grace period.
    pub start_grace: bool,
    /// Calibration data recorded this cycle.
    pub capture: Option<Capture>,
}

impl Transition {
    const fn to(next: ControlState, commands: [MotionCommand; 2]) -> Self {
        Self {
            next,
            commands,
            start_grace: false,
            capture: None,
        }
    }

    const fn idle(next: ControlState) -> Self {
        Self::to(next, [MotionCommand::Idle; 2])
    }
}

/// Run the transition for `inputs.state`.
pub fn step(inputs: &CycleInputs) -> Transition {
    use ControlState::*;

    match inputs.state {
        Stopped => Transition::idle(Stopped),
        Seeking => seeking(inputs),
        CalibrationStarting => calibration_starting(),
        CalibrationSeekingMins => calibration_seeking_mins(inputs),
        CalibrationSeekingMaxes => calibration_seeking_maxes(inputs),
        ErrorSensor | ErrorNoPower | ErrorStalled => Transition::idle(inputs.state),
    }
}

/// Seek one axis toward `target` with deadband hysteresis.
///
/// A moving axis runs until its reading crosses the target; an idle axis
/// starts only when more than one deadband away.
pub fn seek_axis(reading: u16, target: u16, command: MotionCommand, deadband: u16) -> MotionCommand {
    let (reading, target, deadband) = (u32::from(reading), u32::from(target), u32::from(deadband));
    match command {
        MotionCommand::Negative if reading <= target => MotionCommand::Idle,
        MotionCommand::Positive if reading >= target => MotionCommand::Idle,
        MotionCommand::Negative | MotionCommand::Positive => command,
        MotionCommand::Idle if reading > target + deadband => MotionCommand::Negative,
        MotionCommand::Idle if reading + deadband < target => MotionCommand::Positive,
        MotionCommand::Idle => MotionCommand::Idle,
    }
}

fn seeking(inputs: &CycleInputs) -> Transition {
    let mut next = ControlState::Seeking;
    let mut commands = [MotionCommand::Idle; 2];
    for i in 0..2 {
        if inputs.stalled[i] {
            next = ControlState::ErrorStalled;
        } else {
            commands[i] = seek_axis(
                inputs.readings[i],
                inputs.targets[i],
                inputs.commands[i],
                inputs.deadbands[i],
            );
        }
    }
    Transition::to(next, commands)
}

fn calibration_starting() -> Transition {
    Transition {
        start_grace: true,
        ..Transition::to(ControlState::CalibrationSeekingMins, [MotionCommand::Negative; 2])
    }
}

fn calibration_seeking_mins(inputs: &CycleInputs) -> Transition {
    if inputs.grace_active || !inputs.stalled.iter().all(|s| *s) {
        return Transition::to(ControlState::CalibrationSeekingMins, [MotionCommand::Negative; 2]);
    }
    Transition {
        next: ControlState::CalibrationSeekingMaxes,
        commands: [MotionCommand::Positive; 2],
        start_grace: true,
        capture: Some(Capture::Mins(inputs.readings)),
    }
}

fn calibration_seeking_maxes(inputs: &CycleInputs) -> Transition {
    if inputs.grace_active || !inputs.stalled.iter().all(|s| *s) {
        return Transition::to(ControlState::CalibrationSeekingMaxes, [MotionCommand::Positive; 2]);
    }
    let [az_min, el_min] = inputs.recorded_mins;
    let [az_max, el_max] = inputs.readings;
    let bounds = CalibrationBounds::new(az_min, az_max, el_min, el_max);
    if bounds.is_plausible(inputs.min_calibration_span) {
        Transition {
            capture: Some(Capture::Bounds(bounds)),
            ..Transition::idle(ControlState::Stopped)
        }
    } else {
        Transition {
            capture: Some(Capture::Rejected(bounds)),
            ..Transition::idle(ControlState::ErrorSensor)
        }
    }
}
