//! Simulated mount used while a simulation level is active.
//!
//! Readings advance by a fixed number of counts per poll cycle in the
//! commanded direction and clamp to the synthetic bounds.

use crate::calibration::CalibrationBounds;
use crate::converter::Converter;
use rotor_common::config::SimulationConfig;
use rotor_common::consts::EL_MOUNT_MAX;
use rotor_common::state::{Axis, MotionCommand, SimulationMode};
use std::time::Duration;

/// Per-cycle motion model for one simulation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimKinematics {
    bounds: CalibrationBounds,
    steps: [u16; 2],
}

impl SimKinematics {
    /// Model for `mode`, `None` when readings come from hardware.
    pub fn new(mode: SimulationMode, sim: &SimulationConfig, period: Duration) -> Option<Self> {
        let bounds = CalibrationBounds::from(mode.synthetic_bounds()?);
        let converter = Converter::new(Some(bounds), mode);
        let period_s = period.as_secs_f64();
        let step = |axis: Axis, speed_dps: f64| {
            let (dmin, dmax) = converter.degree_range(axis);
            // Azimuth-only leaves elevation a zero-width range; keep the model finite.
            let degrees = if dmax > dmin { dmax - dmin } else { EL_MOUNT_MAX };
            let span = f64::from(bounds.max(axis) - bounds.min(axis));
            let counts = (speed_dps * span / degrees * period_s).round();
            counts.clamp(1.0, f64::from(u16::MAX)) as u16
        };
        Some(Self {
            bounds,
            steps: [
                step(Axis::Azimuth, sim.az_speed_dps),
                step(Axis::Elevation, sim.el_speed_dps),
            ],
        })
    }

    /// Counts travelled per cycle on `axis`.
    pub const fn counts_per_cycle(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Azimuth => self.steps[0],
            Axis::Elevation => self.steps[1],
        }
    }

    /// Next reading of `axis` under `command`.
    pub fn advance(&self, axis: Axis, reading: u16, command: MotionCommand) -> u16 {
        let step = self.counts_per_cycle(axis);
        let (lo, hi) = (self.bounds.min(axis), self.bounds.max(axis));
        match command {
            MotionCommand::Positive => reading.saturating_add(step).min(hi),
            MotionCommand::Negative => reading.saturating_sub(step).max(lo),
            MotionCommand::Idle => reading,
        }
    }
}
