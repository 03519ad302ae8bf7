//! Transport for hosts without a rotator controller.
//!
//! Initializes successfully so the engine can run its simulation levels,
//! but every I/O call fails.

use rotor_common::config::HardwareConfig;
use rotor_common::hal::transport::{PinLevel, Transport, TransportError};

/// Transport that reports no attached hardware.
#[derive(Debug, Default)]
pub struct NoHardware;

impl Transport for NoHardware {
    fn name(&self) -> &'static str {
        "none"
    }

    fn has_hardware(&self) -> bool {
        false
    }

    fn init(&mut self, _outputs: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_output_pin(&mut self, pin: u8, _level: PinLevel) -> Result<(), TransportError> {
        Err(TransportError::NotAvailable(format!("no GPIO for pin {pin}")))
    }

    fn read_adc_channel(&mut self, channel: u8) -> Result<u16, TransportError> {
        Err(TransportError::NotAvailable(format!("no ADC for channel {channel}")))
    }
}

/// Factory function to create a no-hardware transport.
pub fn create_transport(_config: &HardwareConfig) -> Box<dyn Transport> {
    Box::new(NoHardware)
}
