//! # Rotor HAL Library
//!
//! Transports for the rotator control loop. Each transport implements the
//! `Transport` trait defined in `rotor_common::hal::transport`.
//!
//! # Module Structure
//!
//! - [`transport_registry`] - Transport factory registration
//! - [`drivers`] - Transport implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         rotor_hal                            │
//! │  ┌─────────────────────┐       ┌──────────────────────────┐  │
//! │  │ TransportRegistry   │──────►│ Transport (trait object) │  │
//! │  │ name → factory      │       └────────────┬─────────────┘  │
//! │  └─────────────────────┘                    │                │
//! │            ┌──────────────────┬─────────────┴──────┐         │
//! │            ▼                  ▼                    ▼         │
//! │     LinuxTransport        BenchRig           NoHardware      │
//! │   (sysfs GPIO + I2C)   (simulated mount)    (no controller)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod drivers;
pub mod transport_registry;

pub use crate::drivers::bench::{BenchHandle, BenchRig, RigSpec};
pub use crate::drivers::linux::LinuxTransport;
pub use crate::drivers::none::NoHardware;
pub use crate::transport_registry::TransportRegistry;
