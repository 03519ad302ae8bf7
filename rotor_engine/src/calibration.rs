//! Calibration bounds and their persistent key/value store.
//!
//! The record is four `key = integer` lines in any order:
//!
//! ```text
//! ADC_az_min = 120
//! ADC_az_max = 1880
//! ADC_el_min = 90
//! ADC_el_max = 1710
//! ```
//!
//! A record missing any key, or with an implausibly small span, is
//! rejected as a whole.

use rotor_common::config::EngineConfig;
use rotor_common::state::Axis;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const KEY_AZ_MIN: &str = "ADC_az_min";
const KEY_AZ_MAX: &str = "ADC_az_max";
const KEY_EL_MIN: &str = "ADC_el_min";
const KEY_EL_MAX: &str = "ADC_el_max";

/// Raw-count extremes of both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CalibrationBounds {
    /// Azimuth count at the counter-clockwise end-stop.
    pub az_min: u16,
    /// Azimuth count at the clockwise end-stop.
    pub az_max: u16,
    /// Elevation count at the lower end-stop.
    pub el_min: u16,
    /// Elevation count at the upper end-stop.
    pub el_max: u16,
}

impl CalibrationBounds {
    /// Bounds from the four counts.
    pub const fn new(az_min: u16, az_max: u16, el_min: u16, el_max: u16) -> Self {
        Self {
            az_min,
            az_max,
            el_min,
            el_max,
        }
    }

    /// Lower bound of `axis`.
    #[inline]
    pub const fn min(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Azimuth => self.az_min,
            Axis::Elevation => self.el_min,
        }
    }

    /// Upper bound of `axis`.
    #[inline]
    pub const fn max(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Azimuth => self.az_max,
            Axis::Elevation => self.el_max,
        }
    }

    /// True when both axes satisfy `max >= min + min_span`.
    pub fn is_plausible(&self, min_span: u16) -> bool {
        Axis::ALL
            .iter()
            .all(|&axis| u32::from(self.max(axis)) >= u32::from(self.min(axis)) + u32::from(min_span))
    }

    /// Pack into one word for atomic publication.
    pub const fn pack(&self) -> u64 {
        (self.az_min as u64)
            | (self.az_max as u64) << 16
            | (self.el_min as u64) << 32
            | (self.el_max as u64) << 48
    }

    /// Inverse of [`pack`](Self::pack).
    pub const fn unpack(word: u64) -> Self {
        Self {
            az_min: word as u16,
            az_max: (word >> 16) as u16,
            el_min: (word >> 32) as u16,
            el_max: (word >> 48) as u16,
        }
    }
}

impl From<(u16, u16, u16, u16)> for CalibrationBounds {
    fn from((az_min, az_max, el_min, el_max): (u16, u16, u16, u16)) -> Self {
        Self::new(az_min, az_max, el_min, el_max)
    }
}

impl fmt::Display for CalibrationBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "az {}..{} el {}..{}",
            self.az_min, self.az_max, self.el_min, self.el_max
        )
    }
}

/// Calibration store failures. Every load failure means "not found" to the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record path depends on a home directory that could not be determined.
    #[error("No home directory for the calibration record")]
    NoHome,

    /// Record could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// Record path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A required key is absent.
    #[error("Missing key {0}")]
    MissingKey(&'static str),

    /// A key holds something other than a count.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Offending key.
        key: &'static str,
        /// Text found after `=`.
        value: String,
    },

    /// Bounds present but span below the plausibility threshold.
    #[error("Implausible calibration: {0}")]
    Implausible(CalibrationBounds),
}

/// Persistent home for the calibration bounds.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: Option<PathBuf>,
    min_span: u16,
}

impl CalibrationStore {
    /// Store at an explicit path. `None` behaves like a missing home directory.
    pub fn new(path: Option<PathBuf>, min_span: u16) -> Self {
        Self { path, min_span }
    }

    /// Store described by the engine configuration, relative paths under `$HOME`.
    pub fn from_config(engine: &EngineConfig) -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::new(engine.calibration_path(home.as_deref()), engine.min_calibration_span)
    }

    /// Resolved record path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load and validate the stored bounds.
    pub fn load(&self) -> Result<CalibrationBounds, StoreError> {
        let path = self.path.as_deref().ok_or(StoreError::NoHome)?;
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bounds = parse_record(&text)?;
        if !bounds.is_plausible(self.min_span) {
            return Err(StoreError::Implausible(bounds));
        }
        debug!(path = %path.display(), %bounds, "Calibration loaded");
        Ok(bounds)
    }

    /// Write `bounds`, replacing any previous record.
    pub fn save(&self, bounds: &CalibrationBounds) -> Result<(), StoreError> {
        let path = self.path.as_deref().ok_or(StoreError::NoHome)?;
        fs::write(path, render_record(bounds)).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), %bounds, "Calibration saved");
        Ok(())
    }
}

/// Parse a record, requiring all four keys. Unknown lines are ignored.
pub fn parse_record(text: &str) -> Result<CalibrationBounds, StoreError> {
    let mut found: [Option<u16>; 4] = [None; 4];
    let keys = [KEY_AZ_MIN, KEY_AZ_MAX, KEY_EL_MIN, KEY_EL_MAX];

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(slot) = keys.iter().position(|k| *k == key.trim()) else {
            continue;
        };
        let value = value.trim();
        let count = value.parse::<u16>().map_err(|_| StoreError::InvalidValue {
            key: keys[slot],
            value: value.to_string(),
        })?;
        found[slot] = Some(count);
    }

    let get = |slot: usize| found[slot].ok_or(StoreError::MissingKey(keys[slot]));
    Ok(CalibrationBounds::new(get(0)?, get(1)?, get(2)?, get(3)?))
}

/// Render bounds in record form.
pub fn render_record(bounds: &CalibrationBounds) -> String {
    format!(
        "{KEY_AZ_MIN} = {}\n{KEY_AZ_MAX} = {}\n{KEY_EL_MIN} = {}\n{KEY_EL_MAX} = {}\n",
        bounds.az_min, bounds.az_max, bounds.el_min, bounds.el_max
    )
}
