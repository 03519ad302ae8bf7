//! Bench rig transport.
//!
//! Simulates a mount wired to the controller exactly like the real one:
//! relays move the potentiometers, the mechanical end-stops stop them and
//! the power-sense channel reports a healthy supply. Tests reach into the
//! running rig through a [`BenchHandle`] to cut power, jam an axis or
//! break the ADC.

mod rig;

pub use rig::{BenchHandle, BenchRig, RigSpec};

use rotor_common::config::HardwareConfig;
use rotor_common::hal::transport::Transport;

/// Factory function to create a bench rig wired per `config`.
pub fn create_transport(config: &HardwareConfig) -> Box<dyn Transport> {
    Box::new(BenchRig::new(RigSpec::wired_as(config)))
}
