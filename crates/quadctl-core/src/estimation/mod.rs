//! Attitude estimation
//!
//! Two interchangeable estimators behind one trait:
//! - [`MahonyFilter`]: explicit complementary filter
//! - [`QuaternionEkf`]: 7-state quaternion + gyro bias EKF
//!
//! [`Estimator`] wraps either one for static dispatch, and
//! [`AttitudeManager`] drives it from an IMU driver.

pub mod ekf;
pub mod mahony;
pub mod manager;

pub use ekf::*;
pub use mahony::*;
pub use manager::*;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::EulerAngles;

/// Common estimator interface
///
/// Accelerometer input is specific force: a level, stationary airframe
/// reads +g on body Z.
pub trait AttitudeEstimator {
    /// Reset and seed the orientation from gravity (and heading from the
    /// magnetometer) when samples are available
    fn init(&mut self, accel: Option<&Vector3<f32>>, mag: Option<&Vector3<f32>>);

    /// Fuse one sample
    ///
    /// # Arguments
    /// * `gyro` - Body rates [rad/s]
    /// * `accel` - Specific force [m/s²]
    /// * `mag` - Magnetic field, any unit
    fn update(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, mag: Option<&Vector3<f32>>);

    fn quaternion(&self) -> UnitQuaternion<f32>;

    /// Euler angles [rad], recomputed on every update
    fn euler(&self) -> EulerAngles;

    /// Back to identity orientation and zero internal state
    fn reset(&mut self);

    /// Integration step [s]; non-positive values are ignored
    fn set_sample_period(&mut self, dt: f32);
}

/// Estimator selection for configuration files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatorKind {
    #[default]
    Mahony,
    Ekf,
}

/// Either estimator, selected at construction
#[derive(Debug, Clone)]
pub enum Estimator {
    Mahony(MahonyFilter),
    Ekf(QuaternionEkf),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::Mahony(_) => EstimatorKind::Mahony,
            Estimator::Ekf(_) => EstimatorKind::Ekf,
        }
    }

    fn inner(&self) -> &dyn AttitudeEstimator {
        match self {
            Estimator::Mahony(f) => f,
            Estimator::Ekf(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AttitudeEstimator {
        match self {
            Estimator::Mahony(f) => f,
            Estimator::Ekf(f) => f,
        }
    }
}

impl From<MahonyFilter> for Estimator {
    fn from(filter: MahonyFilter) -> Self {
        Estimator::Mahony(filter)
    }
}

impl From<QuaternionEkf> for Estimator {
    fn from(filter: QuaternionEkf) -> Self {
        Estimator::Ekf(filter)
    }
}

impl AttitudeEstimator for Estimator {
    fn init(&mut self, accel: Option<&Vector3<f32>>, mag: Option<&Vector3<f32>>) {
        self.inner_mut().init(accel, mag)
    }

    fn update(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, mag: Option<&Vector3<f32>>) {
        self.inner_mut().update(gyro, accel, mag)
    }

    fn quaternion(&self) -> UnitQuaternion<f32> {
        self.inner().quaternion()
    }

    fn euler(&self) -> EulerAngles {
        self.inner().euler()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn set_sample_period(&mut self, dt: f32) {
        self.inner_mut().set_sample_period(dt)
    }
}
