//! Position + heading
//!
//! A [`Pose`] is ground-frame or body-frame depending on who holds it; the
//! type does not track which.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::math::wrap_pi;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// [m]
    pub x: f32,
    /// [m]
    pub y: f32,
    /// [m]
    pub z: f32,
    /// [rad]
    pub yaw: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32, z: f32, yaw: f32) -> Self {
        Self { x, y, z, yaw }
    }

    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_position(position: &Vector3<f32>, yaw: f32) -> Self {
        Self::new(position.x, position.y, position.z, yaw)
    }

    /// Same pose with yaw wrapped into (−π, π]
    pub fn normalized(&self) -> Self {
        Self {
            yaw: wrap_pi(self.yaw),
            ..*self
        }
    }
}
