//! Engine-level error taxonomy.
//!
//! Every engine API call returns one of these on failure. Front ends map
//! them onto their own wire formats; the engine itself has none.

use thiserror::Error;

/// Error returned by engine API operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotatorError {
    /// Caller input out of range or unrecognised. Never affects control state.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Calibration sweep in progress; retry later.
    #[error("Calibrating, retry later")]
    Calibrating,

    /// Position sensor or relay transport failed.
    #[error("Sensor fault")]
    SensorFault,

    /// Controller power sense below threshold.
    #[error("Rotator controller has no power")]
    PowerFault,

    /// A commanded axis stopped moving.
    #[error("Axis stalled")]
    Stalled,

    /// Engine invariant broken or control loop unavailable.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Transport could not be prepared; the engine did not start.
    #[error("Transport initialization failed: {0}")]
    TransportInit(String),
}

impl RotatorError {
    /// True for faults that persist in control state until a motion request clears them.
    pub const fn is_sticky(&self) -> bool {
        matches!(self, Self::SensorFault | Self::PowerFault | Self::Stalled)
    }

    /// True for transient conditions that resolve without caller action.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Calibrating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_faults() {
        assert!(RotatorError::SensorFault.is_sticky());
        assert!(RotatorError::PowerFault.is_sticky());
        assert!(RotatorError::Stalled.is_sticky());
        assert!(!RotatorError::Calibrating.is_sticky());
        assert!(!RotatorError::InvalidArgument("az".into()).is_sticky());
    }

    #[test]
    fn display_carries_detail() {
        let err = RotatorError::InvalidArgument("azimuth 500".to_string());
        assert!(err.to_string().contains("azimuth 500"));

        let err = RotatorError::TransportInit("/dev/i2c-1: No such file".to_string());
        assert!(err.to_string().contains("/dev/i2c-1"));
        assert!(RotatorError::Calibrating.is_transient());
    }
}
