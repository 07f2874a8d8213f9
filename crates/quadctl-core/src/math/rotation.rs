//! Frame rotations
//!
//! Ground frame and body frame share the convention X forward, Y right,
//! Z up; yaw is measured from +X toward +Y. Only the yaw-plane rotation is
//! used by the position loop, Z passes through unchanged.

use nalgebra::{UnitQuaternion, Vector3};

/// Rotate a ground-frame vector into the yaw-aligned body frame
///
/// ```text
/// x_b =  x cosψ + y sinψ
/// y_b = -x sinψ + y cosψ
/// z_b =  z
/// ```
pub fn ground_to_body(v: &Vector3<f32>, yaw: f32) -> Vector3<f32> {
    let (s, c) = yaw.sin_cos();
    Vector3::new(v.x * c + v.y * s, -v.x * s + v.y * c, v.z)
}

/// Specific force a stationary accelerometer reports at orientation `q`
///
/// v' = R(q)ᵀ [0, 0, g]
pub fn gravity_in_body(q: &UnitQuaternion<f32>, gravity: f32) -> Vector3<f32> {
    q.inverse_transform_vector(&Vector3::new(0.0, 0.0, gravity))
}
