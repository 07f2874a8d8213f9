//! Simulated drivers
//!
//! Deterministic stand-ins for the hardware traits in [`crate::hal`], for
//! tests and desktop hosts that exercise the control stack without a board.

pub mod sensors;

pub use sensors::*;
