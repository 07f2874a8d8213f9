//! Scalar angle helpers
//!
//! All angles are radians. Wrapped angles live in (−π, π].

use core::f32::consts::{PI, TAU};

/// Wrap an angle into (−π, π]
///
/// Non-finite input is returned unchanged so that callers can detect it.
pub fn wrap_pi(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }

    let mut shifted = (angle + PI) % TAU;
    if shifted < 0.0 {
        shifted += TAU;
    }

    let wrapped = shifted - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Signed shortest angular difference `to − from`, wrapped into (−π, π]
pub fn angle_diff(to: f32, from: f32) -> f32 {
    wrap_pi(to - from)
}

/// Interpolate between two headings along the shortest arc
///
/// `t = 0` yields `from`, `t = 1` yields `to` (wrapped).
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    wrap_pi(from + angle_diff(to, from) * t)
}

/// Symmetric saturation `|value| ≤ limit`
///
/// Unlike `f32::clamp` this never panics: a negative limit is treated by
/// magnitude and a NaN limit leaves the value untouched.
pub fn clamp_abs(value: f32, limit: f32) -> f32 {
    let limit = limit.abs();
    value.max(-limit).min(limit)
}

/// Saturate into `[lo, hi]` without panicking on inverted bounds
pub fn clamp_range(value: f32, lo: f32, hi: f32) -> f32 {
    value.max(lo).min(hi)
}
