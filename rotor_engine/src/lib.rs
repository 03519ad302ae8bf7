//! # Rotor Engine
//!
//! Control engine for a two-axis az/el rotator driven by four relays and
//! read back through two potentiometers on an ADC.
//!
//! # Module Structure
//!
//! - [`converter`] - Degrees ↔ raw counts under the current calibration
//! - [`calibration`] - Calibration bounds and their persistent store
//! - [`detector`] - Stall counting and advisory limit detection
//! - [`shared`] - Atomic state shared by the control loop and the API
//! - [`machine`] - Per-state transition functions
//! - [`kinematics`] - Simulated mount used by the simulation levels
//! - [`control_loop`] - The loop that owns the transport
//! - [`engine`] - Non-blocking engine API
//!
//! # Architecture
//!
//! ```text
//!  callers ──► Engine ──(targets, requests)──► SharedState ◄──(readings, state)── ControlLoop ──► Transport
//!                 ▲                                 │                                 │
//!                 └──────────(snapshots)────────────┘                       CalibrationStore
//! ```

#![deny(missing_docs)]

pub mod calibration;
pub mod control_loop;
pub mod converter;
pub mod detector;
pub mod engine;
pub mod kinematics;
pub mod machine;
pub mod shared;

pub use calibration::{CalibrationBounds, CalibrationStore, StoreError};
pub use control_loop::{ControlLoop, ControlLoopHandle, CycleStats};
pub use converter::Converter;
pub use engine::{Capabilities, Engine};
pub use shared::{SharedState, Snapshot};
