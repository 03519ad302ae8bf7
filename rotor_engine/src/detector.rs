//! Stall and limit detection.
//!
//! A stall is commanded motion that produced no sensed displacement for
//! `threshold` consecutive cycles. Limits are advisory: a reading within
//! one deadband of a calibrated bound sets a status flag and nothing else.

use crate::calibration::CalibrationBounds;
use rotor_common::consts::AZ_MOUNT_WRAP;
use rotor_common::state::{Axis, ControlState, MotionCommand};
use rotor_common::status::RotatorStatus;

/// Per-axis stall counter policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallDetector {
    threshold: u8,
}

impl StallDetector {
    /// Detector that trips after `threshold` equal readings (at least 1).
    pub const fn new(threshold: u8) -> Self {
        Self {
            threshold: if threshold == 0 { 1 } else { threshold },
        }
    }

    /// Equal readings needed to report a stall.
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Next counter value.
    ///
    /// Counts only while `command` is active and the reading is unchanged,
    /// saturating at the threshold. Anything else resets to 0.
    #[inline]
    pub fn update(&self, count: u8, command: MotionCommand, previous: u16, current: u16) -> u8 {
        if command.is_active() && previous == current {
            count.saturating_add(1).min(self.threshold)
        } else {
            0
        }
    }

    /// True once the counter has reached the threshold.
    #[inline]
    pub const fn is_stalled(&self, count: u8) -> bool {
        count >= self.threshold
    }
}

/// Which calibrated bound a reading sits on, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSide {
    /// Within one deadband of the lower bound.
    Min,
    /// Within one deadband of the upper bound.
    Max,
}

/// Limit side of `reading` on `axis`. A reading exactly one deadband
/// from a bound is not yet at the limit.
pub fn limit_side(
    bounds: &CalibrationBounds,
    axis: Axis,
    reading: u16,
    deadband: u16,
) -> Option<LimitSide> {
    if reading < bounds.min(axis).saturating_add(deadband) {
        Some(LimitSide::Min)
    } else if bounds.max(axis) < reading.saturating_add(deadband) {
        Some(LimitSide::Max)
    } else {
        None
    }
}

/// Everything the status flags are derived from, captured once per cycle.
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs {
    /// Control state after this cycle's transition.
    pub state: ControlState,
    /// Motion commands `[az, el]`.
    pub commands: [MotionCommand; 2],
    /// Readings `[az, el]`.
    pub readings: [u16; 2],
    /// Deadbands `[az, el]`.
    pub deadbands: [u16; 2],
    /// Bounds, `None` while uncalibrated.
    pub bounds: Option<CalibrationBounds>,
    /// Azimuth reading in degrees.
    pub az_degrees: f64,
}

/// Derive the observer-facing status flags.
pub fn status_flags(inputs: &StatusInputs) -> RotatorStatus {
    let mut status = RotatorStatus::empty();
    let [az_cmd, el_cmd] = inputs.commands;

    match az_cmd {
        MotionCommand::Positive => status |= RotatorStatus::MOVING_AZ | RotatorStatus::MOVING_RIGHT,
        MotionCommand::Negative => status |= RotatorStatus::MOVING_AZ | RotatorStatus::MOVING_LEFT,
        MotionCommand::Idle => {}
    }
    match el_cmd {
        MotionCommand::Positive => status |= RotatorStatus::MOVING_EL | RotatorStatus::MOVING_UP,
        MotionCommand::Negative => status |= RotatorStatus::MOVING_EL | RotatorStatus::MOVING_DOWN,
        MotionCommand::Idle => {}
    }
    let moving = az_cmd.is_active() || el_cmd.is_active();
    if moving {
        status |= RotatorStatus::MOVING;
    }

    if let Some(bounds) = inputs.bounds {
        let [az_db, el_db] = inputs.deadbands;
        match limit_side(&bounds, Axis::Azimuth, inputs.readings[0], az_db) {
            Some(LimitSide::Min) => status |= RotatorStatus::LIMIT_LEFT,
            Some(LimitSide::Max) => status |= RotatorStatus::LIMIT_RIGHT,
            None => {}
        }
        match limit_side(&bounds, Axis::Elevation, inputs.readings[1], el_db) {
            Some(LimitSide::Min) => status |= RotatorStatus::LIMIT_DOWN,
            Some(LimitSide::Max) => status |= RotatorStatus::LIMIT_UP,
            None => {}
        }
        if inputs.az_degrees >= AZ_MOUNT_WRAP {
            status |= RotatorStatus::OVERLAP_RIGHT;
        }
    }

    let busy = inputs.state.is_calibrating()
        || (matches!(inputs.state, ControlState::Seeking) && moving);
    if busy {
        status |= RotatorStatus::BUSY;
    }
    status
}
