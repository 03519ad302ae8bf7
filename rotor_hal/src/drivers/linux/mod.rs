//! Raspberry Pi transport.
//!
//! Drives the four G-5500 relays through sysfs GPIO and samples the
//! azimuth, elevation and power-sense voltages with an ADS1015 on I2C.

mod ads1015;
mod gpio;

pub use ads1015::{Ads1015, decode_conversion, single_shot_config};
pub use gpio::SysfsGpio;

use rotor_common::config::HardwareConfig;
use rotor_common::hal::transport::{PinLevel, Transport, TransportError};
use std::path::PathBuf;
use tracing::{info, warn};

/// Transport for a Raspberry Pi wired to the rotator controller.
#[derive(Debug)]
pub struct LinuxTransport {
    i2c_device: PathBuf,
    adc_address: u8,
    gpio: SysfsGpio,
    outputs: Vec<u8>,
    adc: Option<Ads1015>,
}

impl LinuxTransport {
    /// Create an unopened transport from controller wiring.
    pub fn new(config: &HardwareConfig) -> Self {
        Self {
            i2c_device: config.i2c_device.clone(),
            adc_address: config.adc_address,
            gpio: SysfsGpio::new(&config.gpio_root),
            outputs: Vec::new(),
            adc: None,
        }
    }
}

impl Transport for LinuxTransport {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn has_hardware(&self) -> bool {
        self.i2c_device.exists() && self.gpio.is_present()
    }

    fn init(&mut self, outputs: &[u8]) -> Result<(), TransportError> {
        let adc = Ads1015::open(&self.i2c_device, self.adc_address)?;
        for &pin in outputs {
            self.gpio
                .set_output(pin)
                .and_then(|()| self.gpio.write(pin, PinLevel::Idle))
                .map_err(|e| TransportError::InitFailed(e.to_string()))?;
        }
        self.outputs = outputs.to_vec();
        self.adc = Some(adc);
        info!(
            device = %self.i2c_device.display(),
            address = format_args!("0x{:02X}", self.adc_address),
            pins = ?self.outputs,
            "Linux transport initialized"
        );
        Ok(())
    }

    fn set_output_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), TransportError> {
        self.gpio.write(pin, level)
    }

    fn read_adc_channel(&mut self, channel: u8) -> Result<u16, TransportError> {
        self.adc
            .as_mut()
            .ok_or_else(|| TransportError::I2c("ADC not opened".to_string()))?
            .read_single_ended(channel)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        let mut first_err = None;
        for &pin in &self.outputs {
            if let Err(e) = self.gpio.write(pin, PinLevel::Idle) {
                warn!(pin, error = %e, "Failed to release relay");
                first_err.get_or_insert(e);
            }
        }
        self.adc = None;
        first_err.map_or(Ok(()), Err)
    }
}

/// Factory function to create a Linux transport.
pub fn create_transport(config: &HardwareConfig) -> Box<dyn Transport> {
    Box::new(LinuxTransport::new(config))
}
