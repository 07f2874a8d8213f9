//! Sensor and actuator models for simulation
//!
//! Provides noisy, seedable implementations of the driver traits.

use core::cell::Cell;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::hal::{
    DriverError, HeadingData, Imu, ImuSample, Motor, PoseData, PositioningSensor, VelocityData,
};
use crate::math::gravity_in_body;
use crate::GRAVITY;

/// Simple random number generator (xorshift)
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Gaussian sample via Box-Muller
    pub fn next_gaussian(&mut self) -> f32 {
        let u1 = self.next_f32().max(1e-7);
        let u2 = self.next_f32();

        (-2.0 * u1.ln()).sqrt() * (2.0 * core::f32::consts::PI * u2).cos()
    }

    pub fn next_gaussian_vec3(&mut self, std_dev: f32) -> Vector3<f32> {
        Vector3::new(
            self.next_gaussian() * std_dev,
            self.next_gaussian() * std_dev,
            self.next_gaussian() * std_dev,
        )
    }
}

impl Default for SimpleRng {
    fn default() -> Self {
        Self::new(12345)
    }
}

/// IMU noise model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuNoiseConfig {
    /// Gyroscope white noise std dev [rad/s]
    pub gyro_noise_std: f32,
    /// Accelerometer white noise std dev [m/s²]
    pub accel_noise_std: f32,
    pub seed: u64,
}

impl Default for ImuNoiseConfig {
    fn default() -> Self {
        Self {
            gyro_noise_std: 0.005,
            accel_noise_std: 0.05,
            seed: 12345,
        }
    }
}

/// Stationary-attitude IMU
///
/// Reports the specific force of a hovering airframe at a fixed orientation
/// plus configurable body rates, gyro bias and white noise. The orientation
/// is not integrated from the rates.
#[derive(Debug, Clone)]
pub struct SimImu {
    orientation: UnitQuaternion<f32>,
    body_rates: Vector3<f32>,
    gyro_bias: Vector3<f32>,
    gyro_noise_std: f32,
    accel_noise_std: f32,
    rng: SimpleRng,
    init_error: Option<DriverError>,
    reads: u32,
}

impl SimImu {
    pub fn new(noise: ImuNoiseConfig) -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            body_rates: Vector3::zeros(),
            gyro_bias: Vector3::zeros(),
            gyro_noise_std: noise.gyro_noise_std,
            accel_noise_std: noise.accel_noise_std,
            rng: SimpleRng::new(noise.seed),
            init_error: None,
            reads: 0,
        }
    }

    /// Noise-free, level, at rest
    pub fn ideal() -> Self {
        Self::new(ImuNoiseConfig {
            gyro_noise_std: 0.0,
            accel_noise_std: 0.0,
            seed: 1,
        })
    }

    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f32>) {
        self.orientation = orientation;
    }

    pub fn set_body_rates(&mut self, rates: Vector3<f32>) {
        self.body_rates = rates;
    }

    pub fn set_gyro_bias(&mut self, bias: Vector3<f32>) {
        self.gyro_bias = bias;
    }

    /// Make the next `init()` fail
    pub fn fail_init(&mut self, error: DriverError) {
        self.init_error = Some(error);
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }
}

impl Imu for SimImu {
    fn init(&mut self) -> Result<(), DriverError> {
        match self.init_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read(&mut self) -> ImuSample {
        self.reads = self.reads.wrapping_add(1);
        ImuSample {
            gyro: self.body_rates + self.gyro_bias + self.rng.next_gaussian_vec3(self.gyro_noise_std),
            accel: gravity_in_body(&self.orientation, GRAVITY)
                + self.rng.next_gaussian_vec3(self.accel_noise_std),
        }
    }
}

/// Positioning system whose readings are set from the outside
///
/// Uses `Cell` so that a test can move the vehicle while a controller
/// holds a shared reference.
#[derive(Debug, Default)]
pub struct SimPositioning {
    pose: Cell<PoseData>,
    velocity: Cell<VelocityData>,
    heading: Cell<HeadingData>,
}

impl SimPositioning {
    /// Valid fix at the origin, at rest, facing +X
    pub fn new() -> Self {
        let sensor = Self::default();
        sensor.set_position(0.0, 0.0, 0.0);
        sensor.set_velocity(0.0, 0.0, 0.0);
        sensor.set_yaw(0.0);
        sensor
    }

    pub fn set_position(&self, x: f32, y: f32, z: f32) {
        self.pose.set(PoseData { x, y, z, valid: true });
    }

    pub fn set_velocity(&self, vx: f32, vy: f32, vz: f32) {
        self.velocity.set(VelocityData { vx, vy, vz, valid: true });
    }

    pub fn set_yaw(&self, yaw: f32) {
        self.heading.set(HeadingData { yaw, valid: true });
    }

    /// Mark every feed as lost, keeping the last values
    pub fn invalidate(&self) {
        let mut pose = self.pose.get();
        pose.valid = false;
        self.pose.set(pose);

        let mut velocity = self.velocity.get();
        velocity.valid = false;
        self.velocity.set(velocity);

        let mut heading = self.heading.get();
        heading.valid = false;
        self.heading.set(heading);
    }
}

impl PositioningSensor for SimPositioning {
    fn pose_data(&self) -> PoseData {
        self.pose.get()
    }

    fn velocity_data(&self) -> VelocityData {
        self.velocity.get()
    }

    fn imu_data(&self) -> HeadingData {
        self.heading.get()
    }
}

/// Motor that records the last command
#[derive(Debug, Clone, Copy, Default)]
pub struct SimMotor {
    throttle: f32,
    writes: u32,
}

impl SimMotor {
    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl Motor for SimMotor {
    fn set_throttle(&mut self, value: f32) {
        self.throttle = value;
        self.writes = self.writes.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);

        for _ in 0..10 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_unit_interval() {
        let mut rng = SimpleRng::default();
        for _ in 0..1000 {
            let u = rng.next_f32();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_gaussian_statistics() {
        let mut rng = SimpleRng::new(7);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| rng.next_gaussian()).collect();

        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n as f32;

        assert_relative_eq!(mean, 0.0, epsilon = 0.05);
        assert_relative_eq!(var, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_ideal_imu_level() {
        let mut imu = SimImu::ideal();
        imu.set_gyro_bias(Vector3::new(0.01, 0.0, 0.0));
        let s = imu.read();

        assert_relative_eq!(s.accel, Vector3::new(0.0, 0.0, GRAVITY), epsilon = 1e-6);
        assert_relative_eq!(s.gyro, Vector3::new(0.01, 0.0, 0.0), epsilon = 1e-9);
        assert_eq!(imu.reads(), 1);
    }

    #[test]
    fn test_imu_init_failure_is_one_shot() {
        let mut imu = SimImu::ideal();
        imu.fail_init(DriverError::SelfTestFailed);
        assert_eq!(imu.init(), Err(DriverError::SelfTestFailed));
        assert_eq!(imu.init(), Ok(()));
    }

    #[test]
    fn test_positioning_invalidate_keeps_values() {
        let pos = SimPositioning::new();
        pos.set_position(1.0, 2.0, 3.0);
        pos.invalidate();

        let p = pos.pose_data();
        assert!(!p.valid);
        assert_relative_eq!(p.x, 1.0);
    }
}
