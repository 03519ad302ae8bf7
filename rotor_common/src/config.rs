//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load the rotator's TOML
//! configuration. Every field has a default, so an empty file (or no file
//! at all) yields the stock G-5500 setup on a Raspberry Pi.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rotor_common::config::{ConfigError, ConfigLoader, RotatorConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RotatorConfig::load(Path::new("rotor.toml"))?;
//!     config.validate()?;
//!     println!("Polling every {} ms", config.engine.poll_period_ms);
//!     Ok(())
//! }
//! ```

use crate::consts::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, per-cycle tracing.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "rotor-shack"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Logging verbosity level.
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "rotor".to_string(),
        }
    }
}

/// Control loop and calibration tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Control loop period [ms].
    pub poll_period_ms: u64,
    /// Time relays get to produce motion before stall detection resumes [ms].
    pub motion_start_grace_ms: u64,
    /// Equal consecutive readings on a commanded axis that count as stalled.
    pub stall_threshold: u8,
    /// Azimuth seek/limit deadband [counts].
    pub az_deadband: u16,
    /// Elevation seek/limit deadband [counts].
    pub el_deadband: u16,
    /// Calibration bounds must satisfy `max >= min + span`.
    pub min_calibration_span: u16,
    /// Calibration record path. Relative paths resolve under `$HOME`.
    pub calibration_file: PathBuf,
    /// Simulation level 0..=3. `None` picks 0 with hardware, 3 without.
    pub simulator: Option<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: POLL_PERIOD_MS,
            motion_start_grace_ms: MOTION_START_GRACE_MS,
            stall_threshold: STALL_THRESHOLD,
            az_deadband: AZ_DEADBAND,
            el_deadband: EL_DEADBAND,
            min_calibration_span: MIN_CALIBRATION_SPAN,
            calibration_file: PathBuf::from(CALIBRATION_FILE_NAME),
            simulator: None,
        }
    }
}

impl EngineConfig {
    /// Poll period as a `Duration`.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Grace period rounded up to whole poll cycles, at least one.
    pub fn grace_cycles(&self) -> u32 {
        if self.poll_period_ms == 0 {
            return 1;
        }
        let cycles = self.motion_start_grace_ms.div_ceil(self.poll_period_ms);
        cycles.clamp(1, u32::MAX as u64) as u32
    }

    /// Resolve the calibration record path against a home directory.
    ///
    /// Absolute paths are returned unchanged; relative ones need `home`.
    pub fn calibration_path(&self, home: Option<&Path>) -> Option<PathBuf> {
        if self.calibration_file.is_absolute() {
            Some(self.calibration_file.clone())
        } else {
            home.map(|h| h.join(&self.calibration_file))
        }
    }
}

/// Controller wiring: relay pins, ADC channels and bus addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    /// Transport name registered in the HAL (`linux`, `bench`, `none`).
    pub transport: String,
    /// I2C character device hosting the ADS1015.
    pub i2c_device: PathBuf,
    /// ADS1015 bus address.
    pub adc_address: u8,
    /// Azimuth potentiometer channel.
    pub az_channel: u8,
    /// Elevation potentiometer channel.
    pub el_channel: u8,
    /// Power-sense channel.
    pub power_channel: u8,
    /// Minimum power-sense count while powered.
    pub power_ok_min: u16,
    /// sysfs GPIO root.
    pub gpio_root: PathBuf,
    /// Azimuth clockwise relay (BCM).
    pub pin_az_cw: u8,
    /// Azimuth counter-clockwise relay (BCM).
    pub pin_az_ccw: u8,
    /// Elevation up relay (BCM).
    pub pin_el_up: u8,
    /// Elevation down relay (BCM).
    pub pin_el_down: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            transport: "linux".to_string(),
            i2c_device: PathBuf::from(DEFAULT_I2C_DEVICE),
            adc_address: DEFAULT_ADC_ADDRESS,
            az_channel: ADC_CHANNEL_AZ,
            el_channel: ADC_CHANNEL_EL,
            power_channel: ADC_CHANNEL_POWER,
            power_ok_min: ADC_POWER_OK_MIN,
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
            pin_az_cw: PIN_AZ_CW,
            pin_az_ccw: PIN_AZ_CCW,
            pin_el_up: PIN_EL_UP,
            pin_el_down: PIN_EL_DOWN,
        }
    }
}

impl HardwareConfig {
    /// All four relay pins, azimuth pair first.
    pub fn relay_pins(&self) -> [u8; 4] {
        [self.pin_az_cw, self.pin_az_ccw, self.pin_el_up, self.pin_el_down]
    }
}

/// Simulated kinematics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Azimuth slew rate [deg/s].
    pub az_speed_dps: f64,
    /// Elevation slew rate [deg/s].
    pub el_speed_dps: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            az_speed_dps: SIM_AZ_SPEED_DPS,
            el_speed_dps: SIM_EL_SPEED_DPS,
        }
    }
}

/// Complete rotator configuration.
///
/// # TOML Example
///
/// ```toml
/// [engine]
/// poll_period_ms = 200
/// simulator = 3
///
/// [hardware]
/// transport = "linux"
/// pin_az_cw = 25
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotatorConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Control loop tuning.
    pub engine: EngineConfig,
    /// Controller wiring.
    pub hardware: HardwareConfig,
    /// Simulated kinematics.
    pub simulation: SimulationConfig,
}

impl RotatorConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - `poll_period_ms` or `stall_threshold` is zero
    /// - a deadband is not smaller than half the minimum calibration span
    /// - `simulator` is outside 0..=3
    /// - relay pins or ADC channels are duplicated, or a channel exceeds 3
    /// - a simulated slew rate is not positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.shared.service_name.is_empty() {
            return fail("service_name cannot be empty".to_string());
        }

        let engine = &self.engine;
        if engine.poll_period_ms == 0 {
            return fail("poll_period_ms must be > 0".to_string());
        }
        if engine.stall_threshold == 0 {
            return fail("stall_threshold must be > 0".to_string());
        }
        for (name, deadband) in [("az_deadband", engine.az_deadband), ("el_deadband", engine.el_deadband)] {
            if u32::from(deadband) * 2 >= u32::from(engine.min_calibration_span) {
                return fail(format!(
                    "{name}={deadband} must be < half of min_calibration_span={}",
                    engine.min_calibration_span
                ));
            }
        }
        if let Some(level) = engine.simulator.filter(|level| *level > 3) {
            return fail(format!("simulator={level} not in 0..=3"));
        }

        let hw = &self.hardware;
        let pins = hw.relay_pins();
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return fail(format!("relay pin {pin} assigned twice"));
            }
        }
        let channels = [hw.az_channel, hw.el_channel, hw.power_channel];
        for (i, channel) in channels.iter().enumerate() {
            if *channel > 3 {
                return fail(format!("ADC channel {channel} not in 0..=3"));
            }
            if channels[i + 1..].contains(channel) {
                return fail(format!("ADC channel {channel} assigned twice"));
            }
        }

        let sim = &self.simulation;
        if !(sim.az_speed_dps > 0.0 && sim.el_speed_dps > 0.0) {
            return fail("simulated slew rates must be > 0".to_string());
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
