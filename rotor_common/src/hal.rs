//! Hardware abstraction consumed by the control loop.
//!
//! Only the control loop ever holds a [`transport::Transport`]; engine
//! API callers never touch hardware.

pub mod transport;
