//! Navigation and scheduling configuration
//!
//! [`MissionConfig`] bundles the flight tuning from `quadctl-core` with the
//! waypoint settings and loop scheduling used by the flight tasks.

use quadctl_core::config::FlightConfig;
use quadctl_core::Pose;
use serde::{Deserialize, Serialize};

use crate::path::{Path, GUIDE_POINT_INTERVAL};
use crate::point::{Point, ToleranceParams};

/// Complete configuration of a flight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub flight: FlightConfig,
    pub navigation: NavigationConfig,
    pub schedule: ScheduleConfig,
}

/// Waypoint and guide settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Arrival tolerance of mission waypoints
    pub waypoint_tolerance: ToleranceParams,
    /// Arrival tolerance of interpolated guide poses
    pub guide_tolerance: ToleranceParams,
    /// Guide pose spacing [m]
    pub guide_interval: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            waypoint_tolerance: ToleranceParams::default(),
            guide_tolerance: ToleranceParams::guide(),
            guide_interval: GUIDE_POINT_INTERVAL,
        }
    }
}

impl NavigationConfig {
    /// Waypoint with the configured tolerance
    pub fn waypoint(&self, target: Pose) -> Point {
        Point::new(target, self.waypoint_tolerance)
    }

    /// Empty path with the configured guide settings
    pub fn path<'a, const N: usize>(&self) -> Path<'a, N> {
        Path::with_guide(self.guide_tolerance, self.guide_interval)
    }
}

/// Loop rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Stabilize ticks per position loop update (32 ≈ 16 Hz at 500 Hz)
    pub position_loop_divider: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            position_loop_divider: 32,
        }
    }
}
