//! Observer-facing status flags published by the control loop.

use bitflags::bitflags;

bitflags! {
    /// Rotator status flags, refreshed once per control cycle.
    ///
    /// Limit flags are advisory: a reading within one deadband of a
    /// calibrated bound. They never stop motion by themselves.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RotatorStatus: u32 {
        /// Seeking with an axis in motion, or calibrating.
        const BUSY          = 1 << 0;
        /// Any axis commanded to move.
        const MOVING        = 1 << 1;
        /// Azimuth commanded to move.
        const MOVING_AZ     = 1 << 2;
        /// Azimuth moving counter-clockwise.
        const MOVING_LEFT   = 1 << 3;
        /// Azimuth moving clockwise.
        const MOVING_RIGHT  = 1 << 4;
        /// Elevation commanded to move.
        const MOVING_EL     = 1 << 5;
        /// Elevation moving up.
        const MOVING_UP     = 1 << 6;
        /// Elevation moving down.
        const MOVING_DOWN   = 1 << 7;
        /// Elevation at its upper bound.
        const LIMIT_UP      = 1 << 8;
        /// Elevation at its lower bound.
        const LIMIT_DOWN    = 1 << 9;
        /// Azimuth at its counter-clockwise bound.
        const LIMIT_LEFT    = 1 << 10;
        /// Azimuth at its clockwise bound.
        const LIMIT_RIGHT   = 1 << 11;
        /// Azimuth in the 360..450 overlap region.
        const OVERLAP_RIGHT = 1 << 16;
    }
}

impl RotatorStatus {
    /// True if either limit flag of the azimuth axis is set.
    pub const fn az_at_limit(self) -> bool {
        self.intersects(Self::LIMIT_LEFT.union(Self::LIMIT_RIGHT))
    }

    /// True if either limit flag of the elevation axis is set.
    pub const fn el_at_limit(self) -> bool {
        self.intersects(Self::LIMIT_UP.union(Self::LIMIT_DOWN))
    }
}
