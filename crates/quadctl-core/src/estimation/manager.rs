//! Attitude manager
//!
//! Couples one IMU driver with one estimator. Each `update()` reads a
//! gyro/accel pair and feeds it to the estimator; accessors expose the
//! point-in-time results to the attitude loop.

use log::{info, warn};
use nalgebra::{UnitQuaternion, Vector3};
use thiserror::Error;

use super::{AttitudeEstimator, Estimator};
use crate::hal::{DriverError, Imu};
use crate::math::EulerAngles;

/// Attitude manager initialization failure
#[derive(Debug, Error)]
pub enum AttitudeError {
    #[error("No IMU driver attached")]
    MissingImu,
    #[error("No attitude estimator attached")]
    MissingEstimator,
    #[error("IMU initialization failed: {0}")]
    Driver(#[from] DriverError),
}

/// Orientation and body rate feedback for the attitude loop
pub trait AttitudeSource {
    /// Current roll / pitch / yaw [rad]
    fn attitude(&self) -> EulerAngles;

    /// Current body rates [rad/s]
    fn body_rates(&self) -> Vector3<f32>;
}

/// Frozen attitude feedback
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttitudeSnapshot {
    pub attitude: EulerAngles,
    pub body_rates: Vector3<f32>,
}

impl AttitudeSource for AttitudeSnapshot {
    fn attitude(&self) -> EulerAngles {
        self.attitude
    }

    fn body_rates(&self) -> Vector3<f32> {
        self.body_rates
    }
}

pub struct AttitudeManager<'a> {
    imu: Option<&'a mut dyn Imu>,
    estimator: Option<Estimator>,
    initialized: bool,
    gyro: Vector3<f32>,
    accel: Vector3<f32>,
}

impl<'a> AttitudeManager<'a> {
    pub fn new(imu: Option<&'a mut dyn Imu>, estimator: Option<Estimator>) -> Self {
        Self {
            imu,
            estimator,
            initialized: false,
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
        }
    }

    /// Bring up the IMU and seed the estimator from its first sample
    ///
    /// On failure the manager stays uninitialized and `update()` does nothing.
    pub fn init(&mut self) -> Result<(), AttitudeError> {
        self.initialized = false;

        let Some(imu) = self.imu.as_deref_mut() else {
            warn!("attitude manager: no IMU driver attached");
            return Err(AttitudeError::MissingImu);
        };
        let Some(estimator) = self.estimator.as_mut() else {
            warn!("attitude manager: no estimator attached");
            return Err(AttitudeError::MissingEstimator);
        };

        if let Err(err) = imu.init() {
            warn!("attitude manager: IMU init failed: {err}");
            return Err(err.into());
        }

        let seed = imu.read();
        estimator.init(Some(&seed.accel), None);
        self.gyro = seed.gyro;
        self.accel = seed.accel;
        self.initialized = true;

        info!("attitude manager initialized ({:?} estimator)", estimator.kind());
        Ok(())
    }

    /// Read one sample and run the estimator
    pub fn update(&mut self) {
        if !self.initialized {
            return;
        }
        let (Some(imu), Some(estimator)) = (self.imu.as_deref_mut(), self.estimator.as_mut()) else {
            return;
        };

        let sample = imu.read();
        self.gyro = sample.gyro;
        self.accel = sample.accel;
        estimator.update(&sample.gyro, &sample.accel, None);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Last raw gyro sample [rad/s]
    pub fn gyro(&self) -> Vector3<f32> {
        self.gyro
    }

    /// Last raw accelerometer sample [m/s²]
    pub fn accel(&self) -> Vector3<f32> {
        self.accel
    }

    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.estimator
            .as_ref()
            .map(|e| e.quaternion())
            .unwrap_or_else(UnitQuaternion::identity)
    }

    pub fn euler(&self) -> EulerAngles {
        self.estimator.as_ref().map(|e| e.euler()).unwrap_or_default()
    }

    pub fn estimator(&self) -> Option<&Estimator> {
        self.estimator.as_ref()
    }

    pub fn estimator_mut(&mut self) -> Option<&mut Estimator> {
        self.estimator.as_mut()
    }

    pub fn snapshot(&self) -> AttitudeSnapshot {
        AttitudeSnapshot {
            attitude: self.euler(),
            body_rates: self.gyro,
        }
    }
}

impl AttitudeSource for AttitudeManager<'_> {
    fn attitude(&self) -> EulerAngles {
        self.euler()
    }

    fn body_rates(&self) -> Vector3<f32> {
        self.gyro
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::{MahonyFilter, QuaternionEkf};
    use crate::simulation::SimImu;
    use crate::GRAVITY;
    use approx::assert_relative_eq;

    #[test]
    fn test_init_requires_imu() {
        let mut mgr = AttitudeManager::new(None, Some(MahonyFilter::default().into()));
        assert!(matches!(mgr.init(), Err(AttitudeError::MissingImu)));
        assert!(!mgr.is_initialized());
    }

    #[test]
    fn test_init_requires_estimator() {
        let mut imu = SimImu::ideal();
        let mut mgr = AttitudeManager::new(Some(&mut imu), None);
        assert!(matches!(mgr.init(), Err(AttitudeError::MissingEstimator)));
    }

    #[test]
    fn test_init_propagates_driver_error() {
        let mut imu = SimImu::ideal();
        imu.fail_init(DriverError::NotResponding);
        let mut mgr = AttitudeManager::new(Some(&mut imu), Some(MahonyFilter::default().into()));
        assert!(matches!(
            mgr.init(),
            Err(AttitudeError::Driver(DriverError::NotResponding))
        ));
    }

    #[test]
    fn test_update_is_noop_before_init() {
        let mut imu = SimImu::ideal();
        imu.set_body_rates(Vector3::new(0.0, 0.0, 1.0));
        let mut mgr = AttitudeManager::new(Some(&mut imu), Some(MahonyFilter::default().into()));

        mgr.update();
        assert_relative_eq!(mgr.gyro().norm(), 0.0);
        assert_relative_eq!(mgr.euler().yaw, 0.0);
    }

    #[test]
    fn test_update_feeds_estimator() {
        let mut imu = SimImu::ideal();
        imu.set_body_rates(Vector3::new(0.0, 0.0, 0.5));
        let mut mgr = AttitudeManager::new(Some(&mut imu), Some(QuaternionEkf::default().into()));
        mgr.init().unwrap();

        for _ in 0..500 {
            mgr.update();
        }

        assert_relative_eq!(mgr.gyro().z, 0.5);
        assert_relative_eq!(mgr.accel().z, GRAVITY, epsilon = 1e-5);
        assert_relative_eq!(mgr.euler().yaw, 0.5, epsilon = 1e-2);
        assert_relative_eq!(mgr.body_rates().z, 0.5);
    }
}
