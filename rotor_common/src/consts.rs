//! System-wide constants for the rotator workspace.
//!
//! Single source of truth for mount geometry, hardware defaults and
//! engine tuning. Imported by all crates.

use static_assertions::const_assert;

// ─── Mount Geometry [deg] ───────────────────────────────────────────

/// Minimum azimuth.
pub const AZ_MOUNT_MIN: f64 = 0.0;

/// Maximum azimuth. The mount overlaps 360..450 past north.
pub const AZ_MOUNT_MAX: f64 = 450.0;

/// Azimuth at which the mount is considered wrapped (overlap region).
pub const AZ_MOUNT_WRAP: f64 = 360.0;

/// Minimum elevation.
pub const EL_MOUNT_MIN: f64 = 0.0;

/// Maximum elevation on real hardware.
pub const EL_MOUNT_MAX: f64 = 180.0;

/// Park azimuth.
pub const AZ_PARK: f64 = 0.0;

/// Park elevation.
pub const EL_PARK: f64 = 0.0;

// ─── Engine Tuning ──────────────────────────────────────────────────

/// Control loop poll period [ms].
pub const POLL_PERIOD_MS: u64 = 200;

/// Time given to relays to produce motion before stall detection resumes [ms].
pub const MOTION_START_GRACE_MS: u64 = 1000;

/// Equal consecutive readings on a commanded axis that count as stalled.
pub const STALL_THRESHOLD: u8 = 4;

/// Azimuth seek/limit deadband [counts].
pub const AZ_DEADBAND: u16 = 50;

/// Elevation seek/limit deadband [counts].
pub const EL_DEADBAND: u16 = 50;

/// Calibration bounds must satisfy `max >= min + MIN_CALIBRATION_SPAN`.
pub const MIN_CALIBRATION_SPAN: u16 = 1000;

/// Largest count a 12-bit single-ended ADS1015 conversion produces.
pub const ADC_MAX_COUNT: u16 = 0x7FF;

// ─── Hardware Defaults ──────────────────────────────────────────────

/// Default I2C character device.
pub const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-1";

/// Default ADS1015 bus address.
pub const DEFAULT_ADC_ADDRESS: u8 = 0x48;

/// ADC channel wired to the azimuth potentiometer.
pub const ADC_CHANNEL_AZ: u8 = 0;

/// ADC channel wired to the elevation potentiometer.
pub const ADC_CHANNEL_EL: u8 = 1;

/// ADC channel wired to the controller power sense.
pub const ADC_CHANNEL_POWER: u8 = 2;

/// Minimum power-sense count while the controller is powered.
pub const ADC_POWER_OK_MIN: u16 = 1000;

/// Default sysfs GPIO root.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// BCM pin driving the azimuth clockwise relay (header 22).
pub const PIN_AZ_CW: u8 = 25;

/// BCM pin driving the azimuth counter-clockwise relay (header 24).
pub const PIN_AZ_CCW: u8 = 8;

/// BCM pin driving the elevation up relay (header 26).
pub const PIN_EL_UP: u8 = 7;

/// BCM pin driving the elevation down relay (header 28).
pub const PIN_EL_DOWN: u8 = 1;

// ─── Simulation ─────────────────────────────────────────────────────

/// Simulated azimuth slew rate [deg/s].
pub const SIM_AZ_SPEED_DPS: f64 = 10.0;

/// Simulated elevation slew rate [deg/s].
pub const SIM_EL_SPEED_DPS: f64 = 5.0;

/// Synthetic count at the maximum of a simulated axis.
pub const SIM_MAX_ADC: u16 = 2000;

// ─── Persistence ────────────────────────────────────────────────────

/// Calibration file name, resolved under `$HOME`.
pub const CALIBRATION_FILE_NAME: &str = ".hamlib_g5500_cal.txt";

/// Descriptive string returned by `get_info`.
pub const ROTATOR_INFO: &str = "Yaesu G-5500 az/el rotator, relay drive with ADS1015 feedback";

const_assert!(2 * AZ_DEADBAND < MIN_CALIBRATION_SPAN);
const_assert!(2 * EL_DEADBAND < MIN_CALIBRATION_SPAN);
const_assert!(MIN_CALIBRATION_SPAN < ADC_MAX_COUNT);
const_assert!(SIM_MAX_ADC / 2 >= MIN_CALIBRATION_SPAN);
