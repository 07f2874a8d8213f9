//! # quadctl core
//!
//! Flight-control core of a quadrotor: attitude estimation, cascaded PID
//! control and the X-quad mixer.
//!
//! ## Modules
//!
//! - [`math`]: Angles, quaternion helpers, small dense linear algebra
//! - [`control`]: PID, chassis (attitude loop + mixer), move (position loop)
//! - [`estimation`]: Mahony filter, quaternion EKF, attitude manager
//! - [`hal`]: Driver traits the host implements
//! - [`config`]: Aggregate serde tuning
//! - [`simulation`]: Deterministic simulated drivers

pub mod config;
pub mod control;
pub mod estimation;
pub mod hal;
pub mod math;
pub mod pose;
pub mod simulation;

pub use pose::Pose;

/// Standard gravity [m/s²]
pub const GRAVITY: f32 = 9.81;
