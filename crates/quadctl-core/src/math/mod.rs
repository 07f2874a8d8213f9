//! Mathematical utilities for quadctl
//!
//! Implements angle wrapping, quaternion operations used by the attitude
//! estimators, yaw-plane frame rotations, and small fixed-size linear algebra.

pub mod angle;
pub mod linalg;
pub mod quaternion;
pub mod rotation;

pub use angle::*;
pub use linalg::*;
pub use quaternion::*;
pub use rotation::*;
