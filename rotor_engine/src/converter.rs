//! Coordinate conversion between world degrees and raw ADC counts.

use crate::calibration::CalibrationBounds;
use rotor_common::consts::{AZ_MOUNT_MAX, AZ_MOUNT_MIN, EL_MOUNT_MIN};
use rotor_common::state::{Axis, SimulationMode};

/// Degree ↔ count mapping for one calibration and simulation level.
///
/// Without valid bounds every conversion yields 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converter {
    bounds: Option<CalibrationBounds>,
    mode: SimulationMode,
}

impl Converter {
    /// Build a converter. `bounds` is `None` while uncalibrated.
    pub const fn new(bounds: Option<CalibrationBounds>, mode: SimulationMode) -> Self {
        Self { bounds, mode }
    }

    /// Degree range `(min, max)` of an axis under the current simulation level.
    pub const fn degree_range(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Azimuth => (AZ_MOUNT_MIN, AZ_MOUNT_MAX),
            Axis::Elevation => (EL_MOUNT_MIN, self.mode.elevation_ceiling()),
        }
    }

    /// True when elevation is pinned at 0.
    const fn elevation_pinned(&self, axis: Axis) -> bool {
        matches!(axis, Axis::Elevation) && matches!(self.mode, SimulationMode::AzimuthOnly)
    }

    /// Convert degrees to a raw count, clamping to the axis range.
    pub fn to_raw(&self, axis: Axis, degrees: f64) -> u16 {
        let Some(bounds) = self.bounds else {
            return 0;
        };
        let (lo, hi) = (bounds.min(axis), bounds.max(axis));
        let (dmin, dmax) = self.degree_range(axis);
        if self.elevation_pinned(axis) || degrees <= dmin || degrees.is_nan() {
            return lo;
        }
        if degrees >= dmax {
            return hi;
        }
        let span = f64::from(hi - lo);
        let raw = f64::from(lo) + (degrees - dmin) * span / (dmax - dmin);
        raw.round().clamp(f64::from(lo), f64::from(hi)) as u16
    }

    /// Convert a raw count to degrees, clamping out-of-range counts to the axis range.
    pub fn to_degrees(&self, axis: Axis, count: u16) -> f64 {
        let Some(bounds) = self.bounds else {
            return 0.0;
        };
        if self.elevation_pinned(axis) {
            return 0.0;
        }
        let (lo, hi) = (bounds.min(axis), bounds.max(axis));
        let (dmin, dmax) = self.degree_range(axis);
        if count <= lo {
            return dmin;
        }
        if count >= hi {
            return dmax;
        }
        dmin + f64::from(count - lo) * (dmax - dmin) / f64::from(hi - lo)
    }

    /// Degrees represented by one raw count on `axis`, 0 when uncalibrated.
    pub fn degrees_per_count(&self, axis: Axis) -> f64 {
        match self.bounds {
            Some(bounds) if bounds.max(axis) > bounds.min(axis) => {
                let (dmin, dmax) = self.degree_range(axis);
                (dmax - dmin) / f64::from(bounds.max(axis) - bounds.min(axis))
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated() -> Converter {
        Converter::new(
            Some(CalibrationBounds::new(120, 1880, 90, 1710)),
            SimulationMode::Off,
        )
    }

    #[test]
    fn test_uncalibrated_yields_zero() {
        let conv = Converter::new(None, SimulationMode::Off);
        assert_eq!(conv.to_raw(Axis::Azimuth, 180.0), 0);
        assert_eq!(conv.to_degrees(Axis::Elevation, 900), 0.0);
    }

    #[test]
    fn test_round_trip_within_one_count() {
        let conv = calibrated();
        for axis in Axis::ALL {
            let (dmin, dmax) = conv.degree_range(axis);
            let tolerance = conv.degrees_per_count(axis);
            let mut d = dmin;
            while d <= dmax {
                let back = conv.to_degrees(axis, conv.to_raw(axis, d));
                assert!((back - d).abs() <= tolerance, "{axis} {d} -> {back}");
                d += 7.5;
            }
        }
    }

    #[test]
    fn test_clamping_both_directions() {
        let conv = calibrated();
        assert_eq!(conv.to_raw(Axis::Azimuth, -10.0), 120);
        assert_eq!(conv.to_raw(Axis::Azimuth, 500.0), 1880);
        assert_eq!(conv.to_raw(Axis::Elevation, 200.0), 1710);
        assert_eq!(conv.to_degrees(Axis::Azimuth, 0), 0.0);
        assert_eq!(conv.to_degrees(Axis::Azimuth, 2047), 450.0);
        assert_eq!(conv.to_degrees(Axis::Elevation, 2000), 180.0);
    }

    #[test]
    fn test_endpoints_map_to_bounds() {
        let conv = calibrated();
        assert_eq!(conv.to_raw(Axis::Azimuth, 0.0), 120);
        assert_eq!(conv.to_raw(Axis::Azimuth, 450.0), 1880);
        assert_eq!(conv.to_raw(Axis::Azimuth, 225.0), 1000);
        assert_eq!(conv.to_degrees(Axis::Elevation, 900), 90.0);
    }

    #[test]
    fn test_elevation_ceiling_follows_mode() {
        let conv = Converter::new(
            SimulationMode::Elevation90.synthetic_bounds().map(CalibrationBounds::from),
            SimulationMode::Elevation90,
        );
        assert_eq!(conv.to_raw(Axis::Elevation, 90.0), 1000);
        assert_eq!(conv.to_raw(Axis::Elevation, 120.0), 1000);
        assert_eq!(conv.to_degrees(Axis::Elevation, 500), 45.0);
    }

    #[test]
    fn test_azimuth_only_pins_elevation() {
        let conv = Converter::new(
            SimulationMode::AzimuthOnly.synthetic_bounds().map(CalibrationBounds::from),
            SimulationMode::AzimuthOnly,
        );
        for count in [0, 700, 2000] {
            assert_eq!(conv.to_degrees(Axis::Elevation, count), 0.0);
        }
        assert_eq!(conv.to_raw(Axis::Elevation, 45.0), 0);
        assert_eq!(conv.to_degrees(Axis::Azimuth, 1000), 225.0);
    }
}
