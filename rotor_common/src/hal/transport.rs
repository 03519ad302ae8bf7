//! Transport trait and error types.
//!
//! This module defines:
//! - `Transport` trait - relay outputs and ADC inputs of one rotator controller
//! - `TransportError` enum - opaque transport failures
//! - `PinLevel` enum - relay line state
//! - `TransportFactory` type alias - factory function type

use crate::config::HardwareConfig;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Transport initialization failed.
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// GPIO relay line could not be driven.
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// I2C exchange with the ADC failed.
    #[error("I2C error: {0}")]
    I2c(String),

    /// ADC channel outside the converter's range.
    #[error("Bad ADC channel {0}, must be 0..3")]
    BadChannel(u8),

    /// No compatible hardware on this host.
    #[error("Not available: {0}")]
    NotAvailable(String),
}

/// Relay line state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinLevel {
    /// Relay released.
    #[default]
    Idle,
    /// Relay energised.
    Active,
}

impl PinLevel {
    /// Level as written to a sysfs `value` file.
    pub const fn as_bit(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Active => 1,
        }
    }
}

/// Factory function type for creating transport instances from controller wiring.
pub type TransportFactory = fn(&HardwareConfig) -> Box<dyn Transport>;

/// Trait defining the interface to a rotator controller's I/O.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the control loop starts
/// 2. `set_output_pin()` / `read_adc_channel()` - Called only by the control loop
/// 3. `shutdown()` - Called when the control loop exits
///
/// I/O calls are only valid after a successful `init()`.
pub trait Transport: Send {
    /// Returns the transport's identifier (e.g., "linux", "bench").
    fn name(&self) -> &'static str;

    /// Whether a compatible rotator controller is attached.
    ///
    /// When false the engine defaults to a simulation level.
    fn has_hardware(&self) -> bool {
        true
    }

    /// Prepare the transport, configuring `outputs` as relay outputs.
    ///
    /// # Errors
    /// Return `TransportError::InitFailed` if the hardware cannot be opened.
    fn init(&mut self, outputs: &[u8]) -> Result<(), TransportError>;

    /// Drive one relay line.
    fn set_output_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), TransportError>;

    /// Read one single-ended ADC channel.
    fn read_adc_channel(&mut self, channel: u8) -> Result<u16, TransportError>;

    /// Release the hardware.
    /// Default: no-op.
    fn shutdown(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = TransportError::I2c("write 0x48 failed".to_string());
        assert!(err.to_string().contains("0x48"));

        let err = TransportError::BadChannel(7);
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn pin_level_bits() {
        assert_eq!(PinLevel::Idle.as_bit(), 0);
        assert_eq!(PinLevel::Active.as_bit(), 1);
        assert_eq!(PinLevel::default(), PinLevel::Idle);
    }
}
