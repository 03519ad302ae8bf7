//! Transport implementations.
//!
//! - [`linux`] - Raspberry Pi: sysfs GPIO relays and an ADS1015 ADC over I2C
//! - [`bench`] - Simulated mount with end-stops, power sense and fault injection
//! - [`none`] - Placeholder used when no controller is attached
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `Transport` trait from `rotor_common::hal::transport`
//! 3. Register it in [`register_all_transports`]

pub mod bench;
pub mod linux;
pub mod none;

use crate::transport_registry::TransportRegistry;

/// Register all built-in transports.
pub fn register_all_transports(registry: &mut TransportRegistry) {
    registry.register("linux", linux::create_transport);
    registry.register("bench", bench::create_transport);
    registry.register("none", none::create_transport);
}
