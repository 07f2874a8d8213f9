//! Control loops
//!
//! - [`PidController`]: single-axis PID with anti-windup and derivative filter
//! - [`Chassis`]: attitude / rate cascade and X-quad mixer
//! - [`Move`]: position / velocity cascade producing attitude commands
//! - [`SlopeLimiter`]: throttle ramp
//! - [`ControllerBank`]: storage for the twelve loop controllers

pub mod bank;
pub mod chassis;
pub mod filter;
pub mod movement;
pub mod pid;
pub mod slope;

pub use bank::*;
pub use chassis::*;
pub use filter::*;
pub use movement::*;
pub use pid::*;
pub use slope::*;
