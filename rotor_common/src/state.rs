//! Rotator state enums.
//!
//! All enums crossing the control-loop / API boundary use `#[repr(u8)]`
//! so they can live in a single atomic byte. Includes the control state
//! machine value, simulation level, per-axis motion command and the
//! move directions accepted by the engine API.

use crate::consts::{EL_MOUNT_MAX, SIM_MAX_ADC};
use crate::error::RotatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Axis ───────────────────────────────────────────────────────────

/// One of the two rotator axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Azimuth, degrees eastward from north.
    Azimuth,
    /// Elevation, degrees up from the horizon.
    Elevation,
}

impl Axis {
    /// Both axes, azimuth first.
    pub const ALL: [Axis; 2] = [Axis::Azimuth, Axis::Elevation];

    /// Short label used in log lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Azimuth => "az",
            Self::Elevation => "el",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Motion Command ─────────────────────────────────────────────────

/// Per-axis relay drive command.
///
/// Positive is clockwise for azimuth and up for elevation. Positive and
/// negative are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MotionCommand {
    /// Both relays of the axis idle.
    #[default]
    Idle = 0,
    /// Clockwise (az) or up (el).
    Positive = 1,
    /// Counter-clockwise (az) or down (el).
    Negative = 2,
}

impl MotionCommand {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Positive),
            2 => Some(Self::Negative),
            _ => None,
        }
    }

    /// True when either relay of the axis is driven.
    #[inline]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

// ─── Direction ──────────────────────────────────────────────────────

/// Direction accepted by the engine's move operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Elevation increase.
    Up,
    /// Elevation decrease.
    Down,
    /// Azimuth decrease.
    Left,
    /// Azimuth increase.
    Right,
}

impl Direction {
    /// Rotator protocol code for `Up`.
    pub const CODE_UP: i32 = 2;
    /// Rotator protocol code for `Down`.
    pub const CODE_DOWN: i32 = 4;
    /// Rotator protocol code for `Left`.
    pub const CODE_LEFT: i32 = 8;
    /// Rotator protocol code for `Right`.
    pub const CODE_RIGHT: i32 = 16;

    /// Axis moved by this direction.
    pub const fn axis(self) -> Axis {
        match self {
            Self::Up | Self::Down => Axis::Elevation,
            Self::Left | Self::Right => Axis::Azimuth,
        }
    }

    /// True for the direction that increases the axis reading.
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Up | Self::Right)
    }
}

impl TryFrom<i32> for Direction {
    type Error = RotatorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            Self::CODE_UP => Ok(Self::Up),
            Self::CODE_DOWN => Ok(Self::Down),
            Self::CODE_LEFT => Ok(Self::Left),
            Self::CODE_RIGHT => Ok(Self::Right),
            other => Err(RotatorError::InvalidArgument(format!(
                "unknown direction code {other}"
            ))),
        }
    }
}

impl FromStr for Direction {
    type Err = RotatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(RotatorError::InvalidArgument(format!(
                "unknown direction '{other}'"
            ))),
        }
    }
}

// ─── Control State ──────────────────────────────────────────────────

/// Control loop state machine value.
///
/// Owned by the control loop. The engine API may only request `Stopped`
/// (from anywhere), `CalibrationStarting` and `Seeking` (from `Stopped`
/// or `Seeking`). Error states are sticky until a motion request clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlState {
    /// All relays idle.
    #[default]
    Stopped = 0,
    /// Driving both axes toward their targets.
    Seeking = 1,
    /// Calibration requested, sweep not yet started.
    CalibrationStarting = 2,
    /// Sweeping both axes to their minimum end-stops.
    CalibrationSeekingMins = 3,
    /// Sweeping both axes to their maximum end-stops.
    CalibrationSeekingMaxes = 4,
    /// ADC or relay transport failed.
    ErrorSensor = 5,
    /// Controller power sense below threshold.
    ErrorNoPower = 6,
    /// Commanded axis produced no sensed displacement.
    ErrorStalled = 7,
}

impl ControlState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Seeking),
            2 => Some(Self::CalibrationStarting),
            3 => Some(Self::CalibrationSeekingMins),
            4 => Some(Self::CalibrationSeekingMaxes),
            5 => Some(Self::ErrorSensor),
            6 => Some(Self::ErrorNoPower),
            7 => Some(Self::ErrorStalled),
            _ => None,
        }
    }

    /// True for the three sticky fault states.
    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorSensor | Self::ErrorNoPower | Self::ErrorStalled
        )
    }

    /// True while any calibration phase is running.
    #[inline]
    pub const fn is_calibrating(self) -> bool {
        matches!(
            self,
            Self::CalibrationStarting | Self::CalibrationSeekingMins | Self::CalibrationSeekingMaxes
        )
    }

    /// True for states from which the engine API may start a seek or calibration.
    #[inline]
    pub const fn accepts_motion_request(self) -> bool {
        matches!(self, Self::Stopped | Self::Seeking)
    }

    /// Client-visible fault for an error state, `None` otherwise.
    pub fn fault(self) -> Option<RotatorError> {
        match self {
            Self::ErrorSensor => Some(RotatorError::SensorFault),
            Self::ErrorNoPower => Some(RotatorError::PowerFault),
            Self::ErrorStalled => Some(RotatorError::Stalled),
            Self::Stopped
            | Self::Seeking
            | Self::CalibrationStarting
            | Self::CalibrationSeekingMins
            | Self::CalibrationSeekingMaxes => None,
        }
    }
}

// ─── Simulation Mode ────────────────────────────────────────────────

/// Simulation level selected through the configuration surface (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SimulationMode {
    /// Real hardware.
    #[default]
    Off = 0,
    /// Azimuth only; elevation pinned at 0.
    AzimuthOnly = 1,
    /// Azimuth plus elevation to 90°.
    Elevation90 = 2,
    /// Azimuth plus elevation to 180°.
    Elevation180 = 3,
}

impl SimulationMode {
    /// Level used when no compatible hardware is present.
    pub const NO_HARDWARE_DEFAULT: Self = Self::Elevation180;

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::AzimuthOnly),
            2 => Some(Self::Elevation90),
            3 => Some(Self::Elevation180),
            _ => None,
        }
    }

    /// True when readings come from the internal kinematic model.
    #[inline]
    pub const fn is_simulated(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Highest reachable elevation in degrees.
    pub const fn elevation_ceiling(self) -> f64 {
        match self {
            Self::Off | Self::Elevation180 => EL_MOUNT_MAX,
            Self::AzimuthOnly => 0.0,
            Self::Elevation90 => 90.0,
        }
    }

    /// Synthetic `(az_min, az_max, el_min, el_max)` counts for simulated levels.
    pub const fn synthetic_bounds(self) -> Option<(u16, u16, u16, u16)> {
        match self {
            Self::Off => None,
            Self::AzimuthOnly | Self::Elevation180 => Some((0, SIM_MAX_ADC, 0, SIM_MAX_ADC)),
            Self::Elevation90 => Some((0, SIM_MAX_ADC, 0, SIM_MAX_ADC / 2)),
        }
    }
}

impl TryFrom<u8> for SimulationMode {
    type Error = RotatorError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_u8(level).ok_or_else(|| {
            RotatorError::InvalidArgument(format!("simulation level {level} not in 0..=3"))
        })
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}
