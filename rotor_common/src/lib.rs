//! Rotor Common Library
//!
//! Shared types, constants and configuration for the az/el rotator workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Mount geometry, hardware defaults and engine tuning constants
//! - [`config`] - TOML configuration loading (`RotatorConfig`, `ConfigLoader`)
//! - [`state`] - Axis, direction, motion command, control state and simulation mode enums
//! - [`status`] - Observer-facing status flags
//! - [`error`] - Engine-level error taxonomy
//! - [`hal`] - Transport trait consumed by the control loop
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rotor_common::prelude::*;
//!
//! let mode = SimulationMode::try_from(2u8).unwrap();
//! assert_eq!(mode.elevation_ceiling(), 90.0);
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod prelude;
pub mod state;
pub mod status;
