//! Single target pose with debounced arrival
//!
//! A [`Point`] is reached only after its pose has been inside tolerance for
//! more than `threshold` consecutive checks; one check outside tolerance
//! starts the count over.

use quadctl_core::math::wrap_pi;
use quadctl_core::Pose;
use serde::{Deserialize, Serialize};

/// Arrival tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceParams {
    /// Position error [m]
    pub err_r: f32,
    /// Heading error [rad]
    pub err_yaw: f32,
    /// Consecutive in-tolerance checks required before arrival
    pub threshold: u32,
}

impl ToleranceParams {
    pub const fn new(err_r: f32, err_yaw: f32, threshold: u32) -> Self {
        Self {
            err_r,
            err_yaw,
            threshold,
        }
    }

    /// Tighter tolerance used for interpolated guide poses
    pub const fn guide() -> Self {
        Self::new(0.02, 0.05, 5)
    }
}

impl Default for ToleranceParams {
    fn default() -> Self {
        Self::new(0.1, 0.1, 10)
    }
}

/// `target − current`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseDiff {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    /// Wrapped into (−π, π]
    pub dyaw: f32,
    /// Euclidean position error [m]
    pub distance: f32,
}

impl PoseDiff {
    pub fn between(current: &Pose, target: &Pose) -> Self {
        let dx = target.x - current.x;
        let dy = target.y - current.y;
        let dz = target.z - current.z;
        Self {
            dx,
            dy,
            dz,
            dyaw: wrap_pi(target.yaw - current.yaw),
            distance: (dx * dx + dy * dy + dz * dz).sqrt(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Point {
    target: Pose,
    tolerance: ToleranceParams,
    counter: u32,
}

impl Point {
    pub fn new(target: Pose, tolerance: ToleranceParams) -> Self {
        Self {
            target,
            tolerance,
            counter: 0,
        }
    }

    /// New target; restarts the debounce count
    pub fn set_target_pose(&mut self, target: Pose) {
        self.target = target;
        self.counter = 0;
    }

    pub fn set_error_tolerance(&mut self, err_r: f32, err_yaw: f32) {
        self.tolerance.err_r = err_r;
        self.tolerance.err_yaw = err_yaw;
    }

    pub fn set_tolerance(&mut self, tolerance: ToleranceParams) {
        self.tolerance = tolerance;
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.tolerance.threshold = threshold;
    }

    pub fn target_pose(&self) -> &Pose {
        &self.target
    }

    pub fn tolerance(&self) -> &ToleranceParams {
        &self.tolerance
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    pub fn pose_diff(&self, current: &Pose) -> PoseDiff {
        PoseDiff::between(current, &self.target)
    }

    pub fn within_tolerance(&self, diff: &PoseDiff) -> bool {
        diff.distance <= self.tolerance.err_r && diff.dyaw.abs() <= self.tolerance.err_yaw
    }

    /// Debounced arrival check; call once per navigation tick
    pub fn is_reached(&mut self, current: &Pose) -> bool {
        let diff = self.pose_diff(current);
        if self.within_tolerance(&diff) {
            self.counter = self.counter.saturating_add(1);
            self.counter > self.tolerance.threshold
        } else {
            self.counter = 0;
            false
        }
    }
}
