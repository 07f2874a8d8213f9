//! Driver capability traits
//!
//! The core never touches a bus. Sensor and actuator drivers live outside
//! and are lent to the components through these narrow traits:
//!
//! - [`Imu`]: gyro + accelerometer sampler, consumed by `AttitudeManager`
//! - [`PositioningSensor`]: ground-frame pose / velocity / heading, consumed by `Move`
//! - [`Motor`]: single throttle channel, consumed by `Chassis`

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Driver-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Device did not respond")]
    NotResponding,
    #[error("Device returned an unexpected identity")]
    WrongDevice,
    #[error("Device self-test failed")]
    SelfTestFailed,
}

/// One inertial sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Body rates [rad/s]
    pub gyro: Vector3<f32>,
    /// Specific force [m/s²], +g on Z when level
    pub accel: Vector3<f32>,
}

/// Ground-frame position fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub valid: bool,
}

/// Filtered ground-frame velocity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityData {
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub valid: bool,
}

/// Heading reported by the positioning system's own IMU
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingData {
    /// Yaw [rad]
    pub yaw: f32,
    pub valid: bool,
}

/// Inertial measurement unit
pub trait Imu {
    /// Bring the device up
    fn init(&mut self) -> Result<(), DriverError>;

    /// Latest gyro/accel pair
    fn read(&mut self) -> ImuSample;
}

/// Positioning system (lidar odometry, motion capture, ...)
///
/// Getters take `&self`; drivers that cache frames use interior mutability.
pub trait PositioningSensor {
    fn pose_data(&self) -> PoseData;
    fn velocity_data(&self) -> VelocityData;
    fn imu_data(&self) -> HeadingData;
}

/// One ESC channel
pub trait Motor {
    /// Throttle in [-100, 100]
    fn set_throttle(&mut self, value: f32);
}
