//! ADS1015 single-ended conversions over the Linux i2c-dev interface.

use rotor_common::consts::ADC_MAX_COUNT;
use rotor_common::hal::transport::TransportError;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// `I2C_SLAVE` request from `linux/i2c-dev.h`.
const I2C_SLAVE: libc::c_ulong = 0x0703;

const REG_POINTER_CONVERT: u8 = 0x00;
const REG_POINTER_CONFIG: u8 = 0x01;

const CONFIG_CQUE_NONE: u16 = 0x0003;
const CONFIG_DR_1600SPS: u16 = 0x0080;
const CONFIG_MODE_SINGLE: u16 = 0x0100;
const CONFIG_PGA_4_096V: u16 = 0x0200;
const CONFIG_MUX_SINGLE_0: u16 = 0x4000;
const CONFIG_OS_SINGLE: u16 = 0x8000;

const CONVERSION_DELAY: Duration = Duration::from_millis(1);

/// Config register word starting a single-shot conversion of `channel`
/// at ±4.096 V full scale with the comparator disabled.
pub fn single_shot_config(channel: u8) -> Result<u16, TransportError> {
    if channel > 3 {
        return Err(TransportError::BadChannel(channel));
    }
    Ok(CONFIG_CQUE_NONE
        | CONFIG_DR_1600SPS
        | CONFIG_MODE_SINGLE
        | CONFIG_PGA_4_096V
        | CONFIG_OS_SINGLE
        | (CONFIG_MUX_SINGLE_0 + (u16::from(channel) << 12)))
}

/// Convert the raw conversion register into counts.
///
/// The result sits in the upper 12 bits and is signed; readings slightly
/// below ground come back negative and are reported as 0.
pub fn decode_conversion(raw: u16) -> u16 {
    let counts = raw >> 4;
    if counts > ADC_MAX_COUNT { 0 } else { counts }
}

/// Open ADS1015 on an I2C bus.
#[derive(Debug)]
pub struct Ads1015 {
    bus: File,
    address: u8,
    selected: bool,
}

impl Ads1015 {
    /// Open `device` for the converter at `address`.
    pub fn open(device: &Path, address: u8) -> Result<Self, TransportError> {
        let bus = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| TransportError::InitFailed(format!("{}: {e}", device.display())))?;
        Ok(Self {
            bus,
            address,
            selected: false,
        })
    }

    fn select(&mut self) -> Result<(), TransportError> {
        if self.selected {
            return Ok(());
        }
        // SAFETY: the descriptor is owned by `self.bus` and I2C_SLAVE takes the address by value.
        let ret = unsafe {
            libc::ioctl(
                self.bus.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(self.address),
            )
        };
        if ret < 0 {
            return Err(TransportError::I2c(format!(
                "select 0x{:02X}: {}",
                self.address,
                std::io::Error::last_os_error()
            )));
        }
        self.selected = true;
        Ok(())
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), TransportError> {
        self.select()?;
        let [hi, lo] = value.to_be_bytes();
        self.bus
            .write_all(&[register, hi, lo])
            .map_err(|e| self.bus_error("write", register, e))
    }

    fn read_register(&mut self, register: u8) -> Result<u16, TransportError> {
        self.select()?;
        let mut word = [0u8; 2];
        self.bus
            .write_all(&[register])
            .and_then(|()| self.bus.read_exact(&mut word))
            .map_err(|e| self.bus_error("read", register, e))?;
        Ok(u16::from_be_bytes(word))
    }

    fn bus_error(&self, op: &str, register: u8, e: std::io::Error) -> TransportError {
        TransportError::I2c(format!("{op} 0x{:02X} reg 0x{register:02X}: {e}", self.address))
    }

    /// Run one single-ended conversion and return its count.
    pub fn read_single_ended(&mut self, channel: u8) -> Result<u16, TransportError> {
        let config = single_shot_config(channel)?;
        self.write_register(REG_POINTER_CONFIG, config)?;
        thread::sleep(CONVERSION_DELAY);
        self.read_register(REG_POINTER_CONVERT).map(decode_conversion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_word_per_channel() {
        assert_eq!(single_shot_config(0).unwrap(), 0xC383);
        assert_eq!(single_shot_config(1).unwrap(), 0xD383);
        assert_eq!(single_shot_config(2).unwrap(), 0xE383);
        assert_eq!(single_shot_config(3).unwrap(), 0xF383);
        assert!(matches!(single_shot_config(4), Err(TransportError::BadChannel(4))));
    }

    #[test]
    fn test_decode_conversion() {
        assert_eq!(decode_conversion(0x0000), 0);
        assert_eq!(decode_conversion(0x3E80), 0x3E8);
        assert_eq!(decode_conversion(0x7FF0), 0x7FF);
        // Negative results clamp to zero.
        assert_eq!(decode_conversion(0xFFF0), 0);
        assert_eq!(decode_conversion(0x8000), 0);
    }

    #[test]
    fn test_open_missing_device() {
        let err = Ads1015::open(Path::new("/nonexistent/i2c-9"), 0x48).unwrap_err();
        assert!(matches!(err, TransportError::InitFailed(_)));
    }
}
