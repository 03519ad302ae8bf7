//! Relay outputs through the sysfs GPIO interface.

use rotor_common::hal::transport::{PinLevel, TransportError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// sysfs GPIO class directory.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    /// Use the GPIO class directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether the class directory exists on this host.
    pub fn is_present(&self) -> bool {
        self.root.join("export").exists()
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    /// Export `pin` unless it already is.
    pub fn export(&self, pin: u8) -> Result<(), TransportError> {
        let dir = self.pin_dir(pin);
        if dir.exists() {
            return Ok(());
        }
        write_line(&self.root.join("export"), &pin.to_string())?;
        if !dir.exists() {
            return Err(TransportError::Gpio(format!(
                "pin {pin} did not appear at {}",
                dir.display()
            )));
        }
        debug!(pin, "GPIO exported");
        Ok(())
    }

    /// Configure `pin` as an output.
    pub fn set_output(&self, pin: u8) -> Result<(), TransportError> {
        self.export(pin)?;
        write_line(&self.pin_dir(pin).join("direction"), "out")
    }

    /// Drive `pin` to `level`.
    pub fn write(&self, pin: u8, level: PinLevel) -> Result<(), TransportError> {
        let value = self.pin_dir(pin).join("value");
        if !value.exists() {
            self.export(pin)?;
        }
        write_line(&value, &level.as_bit().to_string())
    }
}

fn write_line(path: &Path, text: &str) -> Result<(), TransportError> {
    fs::write(path, format!("{text}\n"))
        .map_err(|e| TransportError::Gpio(format!("{}: {e}", path.display())))
}
