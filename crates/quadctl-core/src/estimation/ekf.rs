//! Quaternion Extended Kalman Filter
//!
//! 7-state attitude filter: x = [q_w, q_x, q_y, q_z, b_x, b_y, b_z], where b is
//! the gyro bias.
//!
//! Prediction:
//! ```text
//! q' = q ⊗ exp((ω − b) dt)
//! b' = b
//! P' = F P Fᵀ + Q
//! ```
//!
//! Correction against the normalized accelerometer (gravity direction):
//! ```text
//! g_b = R(q)ᵀ [0, 0, −1]       predicted gravity in body frame
//! r   = (−â) − g_b             accelerometer reads the reaction to gravity
//! K   = P Hᵀ (H P Hᵀ + R)⁻¹
//! ```
//!
//! All matrices are fixed-size and live in a scratch block owned by the
//! filter; no step allocates.

use log::trace;
use nalgebra::{Matrix3, Matrix4x3, SMatrix, SVector, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use super::AttitudeEstimator;
use crate::math::{
    euler_from_quaternion, invert_gauss_jordan, left_product_matrix, quaternion_exp,
    quaternion_from_gravity, quaternion_from_vector, quaternion_to_vector, right_product_matrix,
    symmetrize, EulerAngles, NORM_EPSILON,
};

/// State dimension
pub const STATE_DIM: usize = 7;

/// Measurement dimension
pub const MEAS_DIM: usize = 3;

pub type Matrix7 = SMatrix<f32, STATE_DIM, STATE_DIM>;
pub type Matrix3x7 = SMatrix<f32, MEAS_DIM, STATE_DIM>;
pub type Matrix7x3 = SMatrix<f32, STATE_DIM, MEAS_DIM>;
pub type Vector7 = SVector<f32, STATE_DIM>;

/// EKF tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfConfig {
    /// Update rate [Hz]
    pub sample_freq: f32,
    /// Process noise covariance diagonal (Q)
    pub process_noise: [f32; STATE_DIM],
    /// Accelerometer noise covariance diagonal (R)
    pub measurement_noise: [f32; MEAS_DIM],
    /// Initial variance of each quaternion component
    pub initial_quaternion_variance: f32,
    /// Initial variance of each bias component
    pub initial_bias_variance: f32,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            sample_freq: 500.0,
            process_noise: [0.001; STATE_DIM],
            measurement_noise: [0.1; MEAS_DIM],
            initial_quaternion_variance: 0.01,
            initial_bias_variance: 0.1,
        }
    }
}

/// Pre-allocated intermediate matrices
#[derive(Debug, Clone)]
struct EkfScratch {
    f: Matrix7,
    f_t: Matrix7,
    fp: Matrix7,
    h: Matrix3x7,
    h_t: Matrix7x3,
    ph_t: Matrix7x3,
    s: Matrix3<f32>,
    s_inv: Matrix3<f32>,
    k: Matrix7x3,
    kh: Matrix7,
    p_next: Matrix7,
}

impl EkfScratch {
    fn new() -> Self {
        Self {
            f: Matrix7::identity(),
            f_t: Matrix7::identity(),
            fp: Matrix7::zeros(),
            h: Matrix3x7::zeros(),
            h_t: Matrix7x3::zeros(),
            ph_t: Matrix7x3::zeros(),
            s: Matrix3::zeros(),
            s_inv: Matrix3::zeros(),
            k: Matrix7x3::zeros(),
            kh: Matrix7::zeros(),
            p_next: Matrix7::zeros(),
        }
    }
}

/// Quaternion + gyro bias EKF
#[derive(Debug, Clone)]
pub struct QuaternionEkf {
    config: EkfConfig,
    dt: f32,
    q: UnitQuaternion<f32>,
    bias: Vector3<f32>,
    /// State covariance
    p: Matrix7,
    process_noise: Matrix7,
    measurement_noise: Matrix3<f32>,
    euler: EulerAngles,
    scratch: EkfScratch,
}

impl QuaternionEkf {
    pub fn new(config: EkfConfig) -> Self {
        let dt = if config.sample_freq > 0.0 {
            1.0 / config.sample_freq
        } else {
            1.0 / EkfConfig::default().sample_freq
        };

        let mut filter = Self {
            config,
            dt,
            q: UnitQuaternion::identity(),
            bias: Vector3::zeros(),
            p: Matrix7::zeros(),
            process_noise: Matrix7::from_diagonal(&Vector7::from_column_slice(&config.process_noise)),
            measurement_noise: Matrix3::from_diagonal(&Vector3::from_column_slice(
                &config.measurement_noise,
            )),
            euler: EulerAngles::default(),
            scratch: EkfScratch::new(),
        };
        filter.reset_covariance();
        filter
    }

    /// Replace the process noise covariance Q
    pub fn set_process_noise(&mut self, q: &Matrix7) {
        self.process_noise = *q;
    }

    /// Replace the measurement noise covariance R
    pub fn set_measurement_noise(&mut self, r: &Matrix3<f32>) {
        self.measurement_noise = *r;
    }

    /// Estimated gyro bias [rad/s]
    pub fn gyro_bias(&self) -> Vector3<f32> {
        self.bias
    }

    pub fn covariance(&self) -> &Matrix7 {
        &self.p
    }

    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    fn reset_covariance(&mut self) {
        let qv = self.config.initial_quaternion_variance;
        let bv = self.config.initial_bias_variance;
        self.p = Matrix7::from_diagonal(&Vector7::from_column_slice(&[qv, qv, qv, qv, bv, bv, bv]));
    }

    /// Propagate state and covariance with one gyro sample
    fn predict(&mut self, gyro: &Vector3<f32>) {
        let omega = gyro - self.bias;
        let dq = quaternion_exp(&(omega * self.dt));

        let s = &mut self.scratch;

        // ∂q'/∂q = Ρ(δq), ∂q'/∂b = −(dt/2) Ξ(q)
        let (w, x, y, z) = (self.q.w, self.q.i, self.q.j, self.q.k);
        let xi = Matrix4x3::new(
            -x, -y, -z,
             w, -z,  y,
             z,  w, -x,
            -y,  x,  w,
        );
        s.f.fill_with_identity();
        s.f.fixed_view_mut::<4, 4>(0, 0).copy_from(&right_product_matrix(&dq));
        s.f.fixed_view_mut::<4, 3>(0, 4).copy_from(&(xi * (-0.5 * self.dt)));

        let propagated = quaternion_to_vector(&(self.q * dq));
        self.q = quaternion_from_vector(&propagated).unwrap_or(self.q);

        s.fp.gemm(1.0, &s.f, &self.p, 0.0);
        s.f.transpose_to(&mut s.f_t);
        s.p_next.gemm(1.0, &s.fp, &s.f_t, 0.0);
        self.p.copy_from(&s.p_next);
        self.p += &self.process_noise;
    }

    /// Fuse one accelerometer sample
    fn correct(&mut self, accel: &Vector3<f32>) {
        let norm = accel.norm();
        if !(norm > NORM_EPSILON) {
            trace!("ekf: accelerometer norm {norm:e}, skipping correction");
            return;
        }
        let measured = -(accel / norm);

        let (w, x, y, z) = (self.q.w, self.q.i, self.q.j, self.q.k);
        let predicted = Vector3::new(
            -2.0 * (x * z - w * y),
            -2.0 * (y * z + w * x),
            -(w * w - x * x - y * y + z * z),
        );
        let residual = measured - predicted;

        let s = &mut self.scratch;
        s.h.fill(0.0);
        s.h.fixed_view_mut::<3, 4>(0, 0).copy_from(&SMatrix::<f32, 3, 4>::new(
             2.0 * y, -2.0 * z,  2.0 * w, -2.0 * x,
            -2.0 * x, -2.0 * w, -2.0 * z, -2.0 * y,
            -2.0 * w,  2.0 * x,  2.0 * y, -2.0 * z,
        ));

        s.h.transpose_to(&mut s.h_t);
        s.ph_t.gemm(1.0, &self.p, &s.h_t, 0.0);
        s.s.gemm(1.0, &s.h, &s.ph_t, 0.0);
        s.s += &self.measurement_noise;

        if let Err(err) = invert_gauss_jordan(&s.s, &mut s.s_inv) {
            trace!("ekf: innovation covariance not invertible ({err}), skipping correction");
            return;
        }

        s.k.gemm(1.0, &s.ph_t, &s.s_inv, 0.0);
        let dx: Vector7 = s.k * residual;

        let dq = Vector4::new(dx[0], dx[1], dx[2], dx[3]);
        let correction = correction_quaternion(&self.q, &dq);
        let corrected = quaternion_to_vector(&(self.q * correction));
        self.q = quaternion_from_vector(&corrected).unwrap_or(self.q);

        self.bias += Vector3::new(dx[4], dx[5], dx[6]);

        s.kh.gemm(1.0, &s.k, &s.h, 0.0);
        s.kh.neg_mut();
        for i in 0..STATE_DIM {
            s.kh[(i, i)] += 1.0;
        }
        s.p_next.gemm(1.0, &s.kh, &self.p, 0.0);
        self.p.copy_from(&s.p_next);
        symmetrize(&mut self.p);
    }
}

/// Small-angle body-frame correction for an additive quaternion update
///
/// `δq` is expressed in the (w, x, y, z) state components, so the three
/// rotation components are the vector part of `q* ⊗ δq`:
///
/// ```text
/// q_c = normalize([1, vec(Λ(q*) δq)])
/// ```
///
/// A pure roll residual yields a pure roll correction.
fn correction_quaternion(q: &UnitQuaternion<f32>, dq: &Vector4<f32>) -> UnitQuaternion<f32> {
    let local = left_product_matrix(&q.conjugate()) * dq;
    quaternion_from_vector(&Vector4::new(1.0, local[1], local[2], local[3]))
        .unwrap_or_else(UnitQuaternion::identity)
}

impl AttitudeEstimator for QuaternionEkf {
    fn init(&mut self, accel: Option<&Vector3<f32>>, mag: Option<&Vector3<f32>>) {
        self.reset();
        if let Some(q) = accel.and_then(|a| quaternion_from_gravity(a, mag)) {
            self.q = q;
            self.euler = euler_from_quaternion(&self.q);
        }
    }

    /// The magnetometer is not fused yet
    fn update(&mut self, gyro: &Vector3<f32>, accel: &Vector3<f32>, _mag: Option<&Vector3<f32>>) {
        self.predict(gyro);
        self.correct(accel);
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
        self.bias = Vector3::zeros();
        self.euler = EulerAngles::default();
        self.reset_covariance();
    }

    fn set_sample_period(&mut self, dt: f32) {
        if dt > 0.0 {
            self.dt = dt;
        }
    }
}

impl Default for QuaternionEkf {
    fn default() -> Self {
        Self::new(EkfConfig::default())
    }
}
