//! Named transports the engine can be started on.
//!
//! The `[hardware] transport` key of the configuration picks one of these
//! by name. Tests and embedders can add their own before building an engine.

use rotor_common::config::HardwareConfig;
use rotor_common::hal::transport::{Transport, TransportError, TransportFactory};
use std::collections::BTreeMap;
use tracing::debug;

/// Transport factories keyed by configuration name, kept in name order.
pub struct TransportRegistry {
    factories: BTreeMap<&'static str, TransportFactory>,
}

impl TransportRegistry {
    /// Registry with nothing in it.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding `linux`, `bench` and `none`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_transports(&mut registry);
        registry
    }

    /// Add a transport under `name`.
    ///
    /// # Panics
    /// If `name` is taken. Names come from code, so a clash is a wiring bug.
    pub fn register(&mut self, name: &'static str, factory: TransportFactory) {
        if self.factories.insert(name, factory).is_some() {
            panic!("Transport '{name}' is already registered");
        }
    }

    /// Factory registered under `name`.
    pub fn get_factory(&self, name: &str) -> Option<TransportFactory> {
        self.factories.get(name).copied()
    }

    /// Build the transport `name`, wired as `config` describes.
    ///
    /// The transport is returned uninitialized; the engine decides whether to
    /// call `init` based on [`Transport::has_hardware`].
    ///
    /// # Errors
    /// `TransportError::NotAvailable` naming the known transports if `name` is unknown.
    pub fn create(
        &self,
        name: &str,
        config: &HardwareConfig,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let Some(factory) = self.get_factory(name) else {
            return Err(TransportError::NotAvailable(format!(
                "unknown transport '{name}', expected one of {}",
                self.list().join(", ")
            )));
        };
        let transport = factory(config);
        debug!(transport = name, hardware = transport.has_hardware(), "Transport created");
        Ok(transport)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_common::hal::transport::PinLevel;

    /// Reports the power threshold it was wired with on every channel.
    struct FixedAdc {
        value: u16,
    }

    impl Transport for FixedAdc {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn init(&mut self, _outputs: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn set_output_pin(&mut self, _pin: u8, _level: PinLevel) -> Result<(), TransportError> {
            Ok(())
        }

        fn read_adc_channel(&mut self, _channel: u8) -> Result<u16, TransportError> {
            Ok(self.value)
        }
    }

    fn fixed_from_config(config: &HardwareConfig) -> Box<dyn Transport> {
        Box::new(FixedAdc {
            value: config.power_ok_min,
        })
    }

    #[test]
    fn test_custom_transport_sees_config() {
        let mut registry = TransportRegistry::with_builtin();
        registry.register("fixed", fixed_from_config);
        let config = HardwareConfig {
            power_ok_min: 1234,
            ..HardwareConfig::default()
        };

        let mut transport = registry.create("fixed", &config).unwrap();
        assert_eq!(transport.name(), "fixed");
        assert_eq!(transport.read_adc_channel(2).unwrap(), 1234);
    }

    #[test]
    fn test_unknown_name_lists_choices() {
        let registry = TransportRegistry::with_builtin();
        let Err(TransportError::NotAvailable(msg)) = registry.create("serial", &HardwareConfig::default())
        else {
            panic!("unknown transport must be NotAvailable");
        };
        assert!(msg.contains("'serial'"));
        assert!(msg.contains("bench, linux, none"));
    }

    #[test]
    fn test_builtin_names_sorted() {
        assert_eq!(TransportRegistry::with_builtin().list(), vec!["bench", "linux", "none"]);
        assert!(TransportRegistry::default().list().is_empty());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_builtin_name_cannot_be_replaced() {
        let mut registry = TransportRegistry::with_builtin();
        registry.register("bench", fixed_from_config);
    }
}
