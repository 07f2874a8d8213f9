//! Waypoint path with an interpolated guide pose
//!
//! A path borrows an ordered list of [`Point`]s and steers an owned guide
//! point along them:
//!
//! ```text
//!            start_path()          guide reached
//!   Idle ───────────────► MovingToTarget ─────────────► Completed (last waypoint)
//!                              │   ▲
//!              guide reached   │   │ final step: guide = next waypoint
//!                              ▼   │
//!                      MovingBetweenTargets
//!                      (guide advances one step per arrival)
//! ```
//!
//! Between waypoints the guide moves in steps of roughly
//! [`GUIDE_POINT_INTERVAL`], so the position loop always chases a target
//! close to the vehicle.

use heapless::Vec;
use log::debug;
use quadctl_core::math::{lerp_angle, wrap_pi};
use quadctl_core::Pose;
use serde::{Deserialize, Serialize};

use crate::point::{Point, PoseDiff, ToleranceParams};
use crate::NavigationError;

/// Default waypoint capacity of a [`Path`]
pub const DEFAULT_PATH_CAPACITY: usize = 16;

/// Spacing of interpolated guide poses [m]
pub const GUIDE_POINT_INTERVAL: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathState {
    #[default]
    Idle,
    /// Guide sits on a waypoint
    MovingToTarget,
    /// Guide is stepping toward the next waypoint
    MovingBetweenTargets,
    Completed,
}

pub struct Path<'a, const N: usize = DEFAULT_PATH_CAPACITY> {
    points: Vec<&'a Point, N>,
    guide: Point,
    guide_tolerance: ToleranceParams,
    interval: f32,
    state: PathState,
    current_index: usize,
    current_step: u32,
    total_steps: u32,
    segment_start: Pose,
    segment_end: Pose,
}

impl<'a, const N: usize> Path<'a, N> {
    pub fn new() -> Self {
        Self::with_guide(ToleranceParams::guide(), GUIDE_POINT_INTERVAL)
    }

    /// Custom guide tolerance and step spacing
    ///
    /// Non-positive or non-finite intervals fall back to
    /// [`GUIDE_POINT_INTERVAL`].
    pub fn with_guide(guide_tolerance: ToleranceParams, interval: f32) -> Self {
        let interval = if interval.is_finite() && interval > 0.0 {
            interval
        } else {
            GUIDE_POINT_INTERVAL
        };

        Self {
            points: Vec::new(),
            guide: Point::default(),
            guide_tolerance,
            interval,
            state: PathState::Idle,
            current_index: 0,
            current_step: 0,
            total_steps: 0,
            segment_start: Pose::default(),
            segment_end: Pose::default(),
        }
    }

    /// Build a path from waypoints in order
    pub fn from_points(points: &[&'a Point]) -> Result<Self, NavigationError> {
        let mut path = Self::new();
        for point in points {
            path.add_point(*point)?;
        }
        Ok(path)
    }

    pub fn add_point(&mut self, point: &'a Point) -> Result<(), NavigationError> {
        self.points
            .push(point)
            .map_err(|_| NavigationError::PathFull { capacity: N })
    }

    /// Drop all waypoints and return to `Idle`
    pub fn clear(&mut self) {
        self.points.clear();
        self.reset_path();
    }

    pub fn set_guide_tolerance(&mut self, tolerance: ToleranceParams) {
        self.guide_tolerance = tolerance;
    }

    /// Begin at the first waypoint
    pub fn start_path(&mut self) -> Result<(), NavigationError> {
        let Some(first) = self.points.first().copied() else {
            return Err(NavigationError::EmptyPath);
        };
        self.guide.set_target_pose(*first.target_pose());
        self.guide.set_tolerance(*first.tolerance());
        self.current_index = 0;
        self.current_step = 0;
        self.total_steps = 0;
        self.transition(PathState::MovingToTarget);
        Ok(())
    }

    /// Back to `Idle`, keeping the waypoints
    pub fn reset_path(&mut self) {
        self.current_index = 0;
        self.current_step = 0;
        self.total_steps = 0;
        self.state = PathState::Idle;
        self.guide.reset_counter();
    }

    /// Feed the current pose; returns `true` once the path is complete
    ///
    /// Each debounced arrival at the guide pose advances the plan by one
    /// step. `Idle` paths never report arrival.
    pub fn is_reached(&mut self, current: &Pose) -> bool {
        match self.state {
            PathState::Idle => return false,
            PathState::Completed => return true,
            PathState::MovingToTarget | PathState::MovingBetweenTargets => {}
        }
        if self.points.is_empty() {
            return false;
        }

        if self.guide.is_reached(current) {
            match self.state {
                PathState::MovingToTarget => self.begin_segment(),
                PathState::MovingBetweenTargets => self.advance_guide(),
                PathState::Idle | PathState::Completed => {}
            }
        }
        self.state == PathState::Completed
    }

    /// Plan the steps from the current waypoint to the next one
    fn begin_segment(&mut self) {
        let next = self.current_index + 1;
        let (Some(from), Some(to)) = (self.points.get(self.current_index), self.points.get(next)) else {
            self.transition(PathState::Completed);
            return;
        };
        self.segment_start = *from.target_pose();
        self.segment_end = *to.target_pose();

        let distance = (self.segment_end.position() - self.segment_start.position()).norm();
        self.total_steps = if distance < self.interval {
            1
        } else {
            // Rounded to nearest
            (distance / self.interval + 0.5) as u32
        }
        .max(1);
        self.current_step = 0;

        self.guide.set_tolerance(self.guide_tolerance);
        self.transition(PathState::MovingBetweenTargets);
        self.advance_guide();
    }

    fn advance_guide(&mut self) {
        self.current_step += 1;
        if self.current_step < self.total_steps {
            let ratio = self.current_step as f32 / self.total_steps as f32;
            let pose = interpolate_pose(&self.segment_start, &self.segment_end, ratio);
            self.guide.set_target_pose(pose);
            return;
        }

        self.current_index += 1;
        match self.points.get(self.current_index).copied() {
            Some(waypoint) => {
                self.guide.set_target_pose(*waypoint.target_pose());
                self.guide.set_tolerance(*waypoint.tolerance());
                self.transition(PathState::MovingToTarget);
            }
            None => self.transition(PathState::Completed),
        }
    }

    fn transition(&mut self, next: PathState) {
        if self.state != next {
            debug!(
                "path {:?} -> {:?} (waypoint {}, step {}/{})",
                self.state, next, self.current_index, self.current_step, self.total_steps
            );
            self.state = next;
        }
    }

    /// Pose the position loop should track
    ///
    /// Before start this is the first waypoint; after completion the last.
    pub fn current_guide_pose(&self) -> Pose {
        match self.state {
            PathState::Idle => self
                .points
                .first()
                .map(|p| *p.target_pose())
                .unwrap_or_default(),
            _ => *self.guide.target_pose(),
        }
    }

    /// Error from `current` to the guide pose
    pub fn pose_diff_to_target(&self, current: &Pose) -> PoseDiff {
        PoseDiff::between(current, &self.current_guide_pose())
    }

    /// Fraction of the path covered, in [0, 1]
    pub fn progress(&self) -> f32 {
        let count = self.points.len();
        match self.state {
            _ if count == 0 => 0.0,
            PathState::Idle => 0.0,
            PathState::Completed => 1.0,
            PathState::MovingToTarget | PathState::MovingBetweenTargets => {
                let segment = if self.state == PathState::MovingBetweenTargets && self.total_steps > 0 {
                    self.current_step as f32 / self.total_steps as f32
                } else {
                    0.0
                };
                ((self.current_index as f32 + segment) / count as f32).min(1.0)
            }
        }
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn target_count(&self) -> usize {
        self.points.len()
    }

    pub fn current_target_index(&self) -> usize {
        self.current_index
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for Path<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear in position, shortest-arc in yaw
fn interpolate_pose(start: &Pose, end: &Pose, ratio: f32) -> Pose {
    Pose::from_position(
        &start.position().lerp(&end.position(), ratio),
        wrap_pi(lerp_angle(start.yaw, end.yaw, ratio)),
    )
}
