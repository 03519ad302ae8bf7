//! Prelude module for common re-exports.
//!
//! ```rust
//! use rotor_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, EngineConfig, HardwareConfig, LogLevel, RotatorConfig,
    SimulationConfig,
};

// ─── Domain Types ───────────────────────────────────────────────────
pub use crate::error::RotatorError;
pub use crate::state::{Axis, ControlState, Direction, MotionCommand, SimulationMode};
pub use crate::status::RotatorStatus;

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::hal::transport::{PinLevel, Transport, TransportError, TransportFactory};
