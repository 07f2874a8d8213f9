//! Quaternion operations for attitude representation
//!
//! Quaternions are stored as nalgebra `UnitQuaternion<f32>`; the raw
//! component vectors used by the filters are ordered (w, x, y, z).
//!
//! - Quaternion derivative: q̇ = ½ Λ(q)[0; ω]
//! - Exponential map for a rotation increment δθ
//! - ZYX Euler angle conversions
//! - Gravity (and magnetometer) seeded initial orientation

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Rotation increments below this magnitude use the linearized exponential
pub const SMALL_ANGLE_THRESHOLD: f32 = 1e-6;

/// Vectors with a norm below this are treated as absent
pub const NORM_EPSILON: f32 = 1e-6;

/// Roll / pitch / yaw in radians (ZYX convention)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl EulerAngles {
    pub fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Angles as a vector (roll, pitch, yaw)
    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.roll, self.pitch, self.yaw)
    }
}

/// Components as (w, x, y, z)
pub fn quaternion_to_vector(q: &UnitQuaternion<f32>) -> Vector4<f32> {
    Vector4::new(q.w, q.i, q.j, q.k)
}

/// Normalize a raw (w, x, y, z) vector into a unit quaternion
///
/// Returns `None` when the vector is too small to normalize.
pub fn quaternion_from_vector(v: &Vector4<f32>) -> Option<UnitQuaternion<f32>> {
    let norm = v.norm();
    if !(norm > NORM_EPSILON) {
        return None;
    }
    let n = v / norm;
    Some(UnitQuaternion::new_unchecked(Quaternion::new(
        n[0], n[1], n[2], n[3],
    )))
}

/// Compute the quaternion derivative given angular velocity
///
/// q̇ = ½ Λ(q)[0; ω]
///
/// # Arguments
/// * `q` - Current orientation
/// * `omega` - Angular velocity in body frame [rad/s]
///
/// # Returns
/// Quaternion derivative as Vector4 (w, x, y, z)
pub fn quaternion_derivative(q: &UnitQuaternion<f32>, omega: &Vector3<f32>) -> Vector4<f32> {
    let omega_quat = Vector4::new(0.0, omega.x, omega.y, omega.z);
    0.5 * left_product_matrix(q) * omega_quat
}

/// Λ(q) such that q ⊗ p = Λ(q) p
///
/// ```text
/// Λ(q) = [w  -x  -y  -z]
///        [x   w  -z   y]
///        [y   z   w  -x]
///        [z  -y   x   w]
/// ```
pub fn left_product_matrix(q: &UnitQuaternion<f32>) -> Matrix4<f32> {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);
    Matrix4::new(
        w, -x, -y, -z,
        x,  w, -z,  y,
        y,  z,  w, -x,
        z, -y,  x,  w,
    )
}

/// Ρ(p) such that q ⊗ p = Ρ(p) q
///
/// ```text
/// Ρ(p) = [w  -x  -y  -z]
///        [x   w   z  -y]
///        [y  -z   w   x]
///        [z   y  -x   w]
/// ```
pub fn right_product_matrix(p: &UnitQuaternion<f32>) -> Matrix4<f32> {
    let (w, x, y, z) = (p.w, p.i, p.j, p.k);
    Matrix4::new(
        w, -x, -y, -z,
        x,  w,  z, -y,
        y, -z,  w,  x,
        z,  y, -x,  w,
    )
}

/// Integrate quaternion using the derivative
///
/// q_new = normalize(q + q̇ dt). If the sum degenerates the input is returned.
pub fn integrate_quaternion(
    q: &UnitQuaternion<f32>,
    q_dot: &Vector4<f32>,
    dt: f32,
) -> UnitQuaternion<f32> {
    let q_new = quaternion_to_vector(q) + q_dot * dt;
    quaternion_from_vector(&q_new).unwrap_or(*q)
}

/// Exponential map of a body-frame rotation increment
///
/// Uses the exact cos/sin form above [`SMALL_ANGLE_THRESHOLD`] and
/// `[1, δθ/2]` (normalized) below it.
pub fn quaternion_exp(delta_theta: &Vector3<f32>) -> UnitQuaternion<f32> {
    let angle = delta_theta.norm();

    if angle > SMALL_ANGLE_THRESHOLD {
        let half = 0.5 * angle;
        let s = half.sin() / angle;
        UnitQuaternion::new_unchecked(Quaternion::new(
            half.cos(),
            delta_theta.x * s,
            delta_theta.y * s,
            delta_theta.z * s,
        ))
    } else {
        let v = Vector4::new(
            1.0,
            0.5 * delta_theta.x,
            0.5 * delta_theta.y,
            0.5 * delta_theta.z,
        );
        quaternion_from_vector(&v).unwrap_or_else(UnitQuaternion::identity)
    }
}

/// ZYX Euler angles of a unit quaternion
///
/// Pitch uses the asin branch with its argument clamped to [−1, 1].
pub fn euler_from_quaternion(q: &UnitQuaternion<f32>) -> EulerAngles {
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let sin_pitch = (2.0 * (w * y - z * x)).max(-1.0).min(1.0);
    let pitch = sin_pitch.asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

    EulerAngles { roll, pitch, yaw }
}

/// Unit quaternion from ZYX Euler angles using half-angle identities
pub fn quaternion_from_euler(roll: f32, pitch: f32, yaw: f32) -> UnitQuaternion<f32> {
    let (sr, cr) = (0.5 * roll).sin_cos();
    let (sp, cp) = (0.5 * pitch).sin_cos();
    let (sy, cy) = (0.5 * yaw).sin_cos();

    let q = Vector4::new(
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    );
    quaternion_from_vector(&q).unwrap_or_else(UnitQuaternion::identity)
}

/// Orientation implied by a static accelerometer (and optional magnetometer)
///
/// The accelerometer is expected to read +g along body Z when level. Roll and
/// pitch come from the gravity direction; yaw comes from the tilt-compensated
/// magnetometer heading, or zero without one.
///
/// Returns `None` if `accel` has (near) zero norm.
pub fn quaternion_from_gravity(
    accel: &Vector3<f32>,
    mag: Option<&Vector3<f32>>,
) -> Option<UnitQuaternion<f32>> {
    if !(accel.norm() > NORM_EPSILON) {
        return None;
    }

    let roll = accel.y.atan2(accel.z);
    let pitch = (-accel.x).atan2((accel.y * accel.y + accel.z * accel.z).sqrt());

    let yaw = match mag {
        Some(m) if m.norm() > NORM_EPSILON => {
            let (sr, cr) = roll.sin_cos();
            let (sp, cp) = pitch.sin_cos();
            let mx = m.x * cp + m.y * sp * sr + m.z * sp * cr;
            let my = m.y * cr - m.z * sr;
            (-my).atan2(mx)
        }
        _ => 0.0,
    };

    Some(quaternion_from_euler(roll, pitch, yaw))
}

/// Norm of the raw (w, x, y, z) components
pub fn quaternion_norm(q: &UnitQuaternion<f32>) -> f32 {
    quaternion_to_vector(q).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f32::consts::PI;

    #[test]
    fn test_quaternion_derivative_pure_rotation() {
        let q = UnitQuaternion::identity();
        let omega = Vector3::new(0.0, 0.0, 1.0);

        let q_dot = quaternion_derivative(&q, &omega);

        assert_relative_eq!(q_dot, Vector4::new(0.0, 0.0, 0.0, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_product_matrices_agree_with_hamilton_product() {
        let q = quaternion_from_euler(0.3, -0.2, 1.1);
        let p = quaternion_from_euler(-0.7, 0.4, 0.25);

        let expected = quaternion_to_vector(&(q * p));
        let via_left = left_product_matrix(&q) * quaternion_to_vector(&p);
        let via_right = right_product_matrix(&p) * quaternion_to_vector(&q);

        assert_relative_eq!(via_left, expected, epsilon = 1e-5);
        assert_relative_eq!(via_right, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_exp_matches_axis_angle() {
        let delta = Vector3::new(0.0, 0.0, PI / 2.0);
        let q = quaternion_exp(&delta);

        assert_relative_eq!(q.w, (PI / 4.0).cos(), epsilon = 1e-6);
        assert_relative_eq!(q.k, (PI / 4.0).sin(), epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_exp_small_angle_branch() {
        let delta = Vector3::new(1e-7, -2e-7, 0.0);
        let q = quaternion_exp(&delta);

        assert_relative_eq!(quaternion_norm(&q), 1.0, epsilon = 1e-6);
        assert_relative_eq!(q.i, 5e-8, epsilon = 1e-9);
    }

    #[test]
    fn test_euler_roundtrip() {
        let q = quaternion_from_euler(0.4, -0.3, 2.5);
        let e = euler_from_quaternion(&q);

        assert_relative_eq!(e.roll, 0.4, epsilon = 1e-5);
        assert_relative_eq!(e.pitch, -0.3, epsilon = 1e-5);
        assert_relative_eq!(e.yaw, 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_euler_matches_nalgebra_convention() {
        let q = UnitQuaternion::from_euler_angles(0.1, 0.2, -0.3);
        let e = euler_from_quaternion(&q);

        assert_relative_eq!(e.roll, 0.1, epsilon = 1e-5);
        assert_relative_eq!(e.pitch, 0.2, epsilon = 1e-5);
        assert_relative_eq!(e.yaw, -0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_from_gravity_level() {
        let q = quaternion_from_gravity(&Vector3::new(0.0, 0.0, 9.81), None).unwrap();
        assert_relative_eq!(quaternion_to_vector(&q), Vector4::new(1.0, 0.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_from_gravity_tilted_with_heading() {
        let truth = quaternion_from_euler(0.2, -0.1, 0.8);
        let accel = truth.inverse_transform_vector(&Vector3::new(0.0, 0.0, 9.81));
        // Field pointing north (+X) and down
        let mag = truth.inverse_transform_vector(&Vector3::new(0.3, 0.0, -0.4));

        let q = quaternion_from_gravity(&accel, Some(&mag)).unwrap();
        let e = euler_from_quaternion(&q);

        assert_relative_eq!(e.roll, 0.2, epsilon = 1e-4);
        assert_relative_eq!(e.pitch, -0.1, epsilon = 1e-4);
        assert_relative_eq!(e.yaw, 0.8, epsilon = 1e-4);
    }

    #[test]
    fn test_quaternion_from_gravity_rejects_zero() {
        assert!(quaternion_from_gravity(&Vector3::zeros(), None).is_none());
    }
}
