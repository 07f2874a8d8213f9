//! Mahony explicit complementary filter
//!
//! Gyro integration corrected by the cross product between the measured and
//! predicted gravity (and magnetic field) directions:
//!
//! ```text
//! e   = â × v̂ (+ m̂ × ŵ)
//! ω'  = ω + Kp·e + Ki·∫e dt
//! q̇   = ½ q ⊗ [0; ω']
//! ```
//!
//! Predicted directions are formed at half scale, so the gains are applied
//! as `2·Kp` and `2·Ki` on the half-error.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::AttitudeEstimator;
use crate::math::{
    euler_from_quaternion, integrate_quaternion, quaternion_derivative, quaternion_from_gravity,
    EulerAngles, NORM_EPSILON,
};

/// Mahony filter tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MahonyConfig {
    /// Update rate [Hz]
    pub sample_freq: f32,
    /// Proportional gain
    pub kp: f32,
    /// Integral gain (0 disables bias learning)
    pub ki: f32,
}

impl Default for MahonyConfig {
    fn default() -> Self {
        Self {
            sample_freq: 500.0,
            kp: 0.6,
            ki: 0.02,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MahonyFilter {
    config: MahonyConfig,
    dt: f32,
    q: UnitQuaternion<f32>,
    /// Accumulated integral feedback [rad/s]
    integral_fb: Vector3<f32>,
    euler: EulerAngles,
}

impl MahonyFilter {
    pub fn new(config: MahonyConfig) -> Self {
        let dt = if config.sample_freq > 0.0 {
            1.0 / config.sample_freq
        } else {
            1.0 / MahonyConfig::default().sample_freq
        };

        Self {
            config,
            dt,
            q: UnitQuaternion::identity(),
            integral_fb: Vector3::zeros(),
            euler: EulerAngles::default(),
        }
    }

    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.config.kp = kp;
        self.config.ki = ki;
        if ki <= 0.0 {
            self.integral_fb = Vector3::zeros();
        }
    }

    pub fn config(&self) -> &MahonyConfig {
        &self.config
    }

    /// Integral feedback term (estimated negative gyro bias)
    pub fn integral_feedback(&self) -> Vector3<f32> {
        self.integral_fb
    }

    /// Half-scale orientation error from the accelerometer
    fn gravity_error(&self, accel: &Vector3<f32>) -> Option<Vector3<f32>> {
        let norm = accel.norm();
        if !(norm > NORM_EPSILON) {
            return None;
        }
        let a = accel / norm;
        let (q0, q1, q2, q3) = (self.q.w, self.q.i, self.q.j, self.q.k);

        let half_v = Vector3::new(
            q1 * q3 - q0 * q2,
            q0 * q1 + q2 * q3,
            q0 * q0 - 0.5 + q3 * q3,
        );

        Some(a.cross(&half_v))
    }

    /// Half-scale orientation error from the magnetometer
    ///
    /// The reference field is rebuilt every cycle as a horizontal component
    /// `bx` (toward +X) and a vertical component `bz`.
    fn magnetic_error(&self, mag: &Vector3<f32>) -> Option<Vector3<f32>> {
        let norm = mag.norm();
        if !(norm > NORM_EPSILON) {
            return None;
        }
        let m = mag / norm;
        let (q0, q1, q2, q3) = (self.q.w, self.q.i, self.q.j, self.q.k);

        let (q0q1, q0q2, q0q3) = (q0 * q1, q0 * q2, q0 * q3);
        let (q1q1, q1q2, q1q3) = (q1 * q1, q1 * q2, q1 * q3);
        let (q2q2, q2q3) = (q2 * q2, q2 * q3);
        let q3q3 = q3 * q3;

        // Field in the earth frame
        let hx = 2.0 * (m.x * (0.5 - q2q2 - q3q3) + m.y * (q1q2 - q0q3) + m.z * (q1q3 + q0q2));
        let hy = 2.0 * (m.x * (q1q2 + q0q3) + m.y * (0.5 - q1q1 - q3q3) + m.z * (q2q3 - q0q1));
        let bx = (hx * hx + hy * hy).sqrt();
        let bz = 2.0 * (m.x * (q1q3 - q0q2) + m.y * (q2q3 + q0q1) + m.z * (0.5 - q1q1 - q2q2));

        let half_w = Vector3::new(
            bx * (0.5 - q2q2 - q3q3) + bz * (q1q3 - q0q2),
            bx * (q1q2 - q0q3) + bz * (q0q1 + q2q3),
            bx * (q0q2 + q1q3) + bz * (0.5 - q1q1 - q2q2),
        );

        Some(m.cross(&half_w))
    }
}

impl AttitudeEstimator for MahonyFilter {
    fn init(&mut self, accel: Option<&Vector3<f32>>, mag: Option<&Vector3<f32>>) {
        self.reset();
        if let Some(q) = accel.and_then(|a| quaternion_from_gravity(a, mag)) {
            self.q = q;
            self.euler = euler_from_quaternion(&self.q);
        }
    }

    fn update(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, mag: Option<&Vector3<f32>>) {
        let mut half_e = Vector3::zeros();
        let mut corrected = false;

        if let Some(e) = self.gravity_error(accel) {
            half_e += e;
            corrected = true;
        }
        if let Some(e) = mag.and_then(|m| self.magnetic_error(m)) {
            half_e += e;
            corrected = true;
        }

        let mut omega = *gyro;
        if corrected {
            if self.config.ki > 0.0 {
                self.integral_fb += 2.0 * self.config.ki * half_e * self.dt;
                omega += self.integral_fb;
            } else {
                self.integral_fb = Vector3::zeros();
            }
            omega += 2.0 * self.config.kp * half_e;
        }

        let q_dot = quaternion_derivative(&self.q, &omega);
        self.q = integrate_quaternion(&self.q, &q_dot, self.dt);
        self.euler = euler_from_quaternion(&self.q);
    }

    fn quaternion(&self) -> UnitQuaternion<f32> {
        self.q
    }

    fn euler(&self) -> EulerAngles {
        self.euler
    }

    fn reset(&mut self) {
        self.q = UnitQuaternion::identity();
        self.integral_fb = Vector3::zeros();
        self.euler = EulerAngles::default();
    }

    fn set_sample_period(&mut self, dt: f32) {
        if dt > 0.0 {
            self.dt = dt;
        }
    }
}

impl Default for MahonyFilter {
    fn default() -> Self {
        Self::new(MahonyConfig::default())
    }
}
