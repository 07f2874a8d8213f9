//! Position / velocity cascade
//!
//! ```text
//! target pos ──► position PID ──► target vel ──► velocity PID ──► pitch / roll / throttle
//!                     ▲                               ▲
//!              body-frame error                body-frame velocity
//! ```
//!
//! Positions come from the positioning sensor in its own ground frame. A
//! configurable origin `{x, y, z, yaw}` is subtracted first, so targets are
//! expressed in a local frame whose +X points along the heading captured by
//! [`Move::set_current_as_origin`]. Errors and velocities are then rotated
//! into the body frame by the current local yaw:
//!
//! - body X (forward) is driven by the pitch command
//! - body Y (right) is driven by the roll command
//! - Z is driven by the additive throttle command

use core::f32::consts::FRAC_PI_6;

use log::{info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pid::PidController;
use crate::hal::PositioningSensor;
use crate::math::{clamp_abs, ground_to_body, wrap_pi};
use crate::pose::Pose;

/// Translational axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearAxis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl LinearAxis {
    pub const ALL: [LinearAxis; 3] = [LinearAxis::X, LinearAxis::Y, LinearAxis::Z];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Positioning sensor not attached")]
    MissingSensor,
    #[error("{0:?} position PID not attached")]
    MissingPositionPid(LinearAxis),
    #[error("{0:?} velocity PID not attached")]
    MissingVelocityPid(LinearAxis),
    #[error("Move controller not initialized")]
    NotInitialized,
    #[error("Positioning sensor has no valid fix")]
    NoValidPose,
}

/// Borrowed collaborators, PIDs indexed by [`LinearAxis`]
#[derive(Default)]
pub struct MoveDependencies<'a> {
    pub sensor: Option<&'a dyn PositioningSensor>,
    pub position_pids: [Option<&'a mut PidController>; 3],
    pub velocity_pids: [Option<&'a mut PidController>; 3],
}

/// Output limits of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    /// Roll / pitch command limit [rad]
    pub max_tilt: f32,
    /// Additive throttle limit [%]
    pub max_throttle: f32,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            max_tilt: FRAC_PI_6,
            max_throttle: 50.0,
        }
    }
}

/// Attitude setpoint handed to the chassis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttitudeCommand {
    /// [rad]
    pub roll: f32,
    /// [rad]
    pub pitch: f32,
    /// Added to the hover throttle [%]
    pub throttle: f32,
}

/// Snapshot of the last cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveStatus {
    /// Position in the local frame [m]
    pub position: Vector3<f32>,
    /// Velocity in the local frame [m/s]
    pub velocity: Vector3<f32>,
    /// Heading in the local frame [rad]
    pub yaw: f32,
    /// Position error rotated into the body frame [m]
    pub position_error_body: Vector3<f32>,
    /// Velocity rotated into the body frame [m/s]
    pub velocity_body: Vector3<f32>,
    /// Velocity setpoint fed to the inner loop [m/s]
    pub target_velocity: Vector3<f32>,
    pub command: AttitudeCommand,
}

pub struct Move<'a> {
    deps: MoveDependencies<'a>,
    config: MoveConfig,
    initialized: bool,
    target: Pose,
    target_velocity: Vector3<f32>,
    position_control: bool,
    offset: Pose,
    status: MoveStatus,
}

impl<'a> Move<'a> {
    pub fn new(deps: MoveDependencies<'a>, config: MoveConfig) -> Self {
        Self {
            deps,
            config,
            initialized: false,
            target: Pose::default(),
            target_velocity: Vector3::zeros(),
            position_control: true,
            offset: Pose::default(),
            status: MoveStatus::default(),
        }
    }

    /// Validate the sensor and all six PIDs, then clear targets
    pub fn init(&mut self) -> Result<(), MoveError> {
        self.initialized = false;

        if let Err(err) = self.validate() {
            warn!("move init failed: {err}");
            return Err(err);
        }

        self.target = Pose::default();
        self.target_velocity = Vector3::zeros();
        self.position_control = true;
        self.status = MoveStatus::default();
        self.initialized = true;
        info!("move controller initialized");
        Ok(())
    }

    fn validate(&self) -> Result<(), MoveError> {
        if self.deps.sensor.is_none() {
            return Err(MoveError::MissingSensor);
        }
        for axis in LinearAxis::ALL {
            if self.deps.position_pids[axis.index()].is_none() {
                return Err(MoveError::MissingPositionPid(axis));
            }
            if self.deps.velocity_pids[axis.index()].is_none() {
                return Err(MoveError::MissingVelocityPid(axis));
            }
        }
        Ok(())
    }

    /// Run one position cycle
    ///
    /// The resulting command is read back with [`Move::command`].
    pub fn update(&mut self) {
        if !self.initialized {
            return;
        }
        let Some(sensor) = self.deps.sensor else {
            return;
        };
        self.read_sensor(sensor);

        let yaw = self.status.yaw;
        let error_ground = self.target.position() - self.status.position;
        let error_body = ground_to_body(&error_ground, yaw);
        let velocity_body = ground_to_body(&self.status.velocity, yaw);

        let target_velocity = if self.position_control {
            let mut v = Vector3::zeros();
            for axis in LinearAxis::ALL {
                let i = axis.index();
                if let Some(pid) = self.deps.position_pids[i].as_deref_mut() {
                    v[i] = pid.step(error_body[i], 0.0);
                }
            }
            v
        } else {
            self.target_velocity
        };

        let mut out = Vector3::zeros();
        for axis in LinearAxis::ALL {
            let i = axis.index();
            if let Some(pid) = self.deps.velocity_pids[i].as_deref_mut() {
                out[i] = pid.step(target_velocity[i], velocity_body[i]);
            }
        }

        self.status.position_error_body = error_body;
        self.status.velocity_body = velocity_body;
        self.status.target_velocity = target_velocity;
        self.status.command = AttitudeCommand {
            roll: clamp_abs(out[LinearAxis::Y.index()], self.config.max_tilt),
            pitch: clamp_abs(out[LinearAxis::X.index()], self.config.max_tilt),
            throttle: clamp_abs(out[LinearAxis::Z.index()], self.config.max_throttle),
        };
    }

    /// Latch the latest valid samples, expressed in the local frame
    fn read_sensor(&mut self, sensor: &dyn PositioningSensor) {
        let pose = sensor.pose_data();
        if pose.valid {
            let raw = Vector3::new(pose.x, pose.y, pose.z);
            self.status.position = ground_to_body(&(raw - self.offset.position()), self.offset.yaw);
        }

        let velocity = sensor.velocity_data();
        if velocity.valid {
            let raw = Vector3::new(velocity.vx, velocity.vy, velocity.vz);
            self.status.velocity = ground_to_body(&raw, self.offset.yaw);
        }

        let heading = sensor.imu_data();
        if heading.valid {
            self.status.yaw = wrap_pi(heading.yaw - self.offset.yaw);
        }
    }

    /// Clear all six PIDs and zero the command
    pub fn reset(&mut self) {
        for pid in self
            .deps
            .position_pids
            .iter_mut()
            .chain(self.deps.velocity_pids.iter_mut())
            .flatten()
        {
            pid.reset();
        }
        self.status.target_velocity = Vector3::zeros();
        self.status.command = AttitudeCommand::default();
    }

    /// Local-frame position target [m]; switches to position control
    pub fn set_target_position(&mut self, x: f32, y: f32, z: f32) {
        self.target.x = x;
        self.target.y = y;
        self.target.z = z;
        self.position_control = true;
    }

    /// Position and heading target; switches to position control
    pub fn set_target_pose(&mut self, pose: &Pose) {
        self.target = pose.normalized();
        self.position_control = true;
    }

    /// Body-frame velocity target [m/s]; switches to velocity control
    pub fn set_target_velocity(&mut self, vx: f32, vy: f32, vz: f32) {
        self.target_velocity = Vector3::new(vx, vy, vz);
        self.position_control = false;
    }

    pub fn set_position_control_mode(&mut self, enabled: bool) {
        self.position_control = enabled;
    }

    pub fn is_position_control(&self) -> bool {
        self.position_control
    }

    /// Origin of the local frame, in sensor coordinates
    pub fn set_offset(&mut self, offset: &Pose) {
        self.offset = offset.normalized();
    }

    pub fn offset(&self) -> Pose {
        self.offset
    }

    /// Make the current sensor fix the local origin
    ///
    /// The heading is taken along when the sensor reports a valid one.
    pub fn set_current_as_origin(&mut self) -> Result<(), MoveError> {
        let Some(sensor) = self.deps.sensor else {
            return Err(MoveError::MissingSensor);
        };
        let pose = sensor.pose_data();
        if !pose.valid {
            warn!("set origin rejected: no valid pose");
            return Err(MoveError::NoValidPose);
        }
        let heading = sensor.imu_data();
        let yaw = if heading.valid { heading.yaw } else { self.offset.yaw };

        self.offset = Pose::new(pose.x, pose.y, pose.z, yaw).normalized();
        info!(
            "local origin set at ({:.3}, {:.3}, {:.3}) yaw {:.3}",
            self.offset.x, self.offset.y, self.offset.z, self.offset.yaw
        );
        Ok(())
    }

    /// Pose in the local frame as of the last update
    pub fn current_pose(&self) -> Pose {
        Pose::from_position(&self.status.position, self.status.yaw)
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    /// Target heading in the sensor's frame, for the attitude loop
    pub fn target_heading(&self) -> f32 {
        wrap_pi(self.target.yaw + self.offset.yaw)
    }

    pub fn command(&self) -> AttitudeCommand {
        self.status.command
    }

    pub fn status(&self) -> &MoveStatus {
        &self.status
    }

    pub fn config(&self) -> &MoveConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::PidConfig;
    use crate::simulation::SimPositioning;
    use approx::assert_relative_eq;
    use core::f32::consts::FRAC_PI_2;

    fn p_only(kp: f32) -> PidController {
        PidController::new(PidConfig::with_gains(kp, 0.0, 0.0))
    }

    fn deps<'a>(
        sensor: &'a SimPositioning,
        position: &'a mut [PidController; 3],
        velocity: &'a mut [PidController; 3],
    ) -> MoveDependencies<'a> {
        let sensor: &dyn PositioningSensor = sensor;
        MoveDependencies {
            sensor: Some(sensor),
            position_pids: position.each_mut().map(Some),
            velocity_pids: velocity.each_mut().map(Some),
        }
    }

    #[test]
    fn test_init_requires_sensor() {
        let mut mv = Move::new(MoveDependencies::default(), MoveConfig::default());
        assert!(matches!(mv.init(), Err(MoveError::MissingSensor)));
        assert!(!mv.is_initialized());
    }

    #[test]
    fn test_init_names_missing_pid() {
        let sensor = SimPositioning::new();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut d = deps(&sensor, &mut position, &mut velocity);
        d.velocity_pids[2] = None;

        let mut mv = Move::new(d, MoveConfig::default());
        assert!(matches!(
            mv.init(),
            Err(MoveError::MissingVelocityPid(LinearAxis::Z))
        ));
    }

    #[test]
    fn test_forward_error_commands_pitch() {
        let sensor = SimPositioning::new();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(0.2), p_only(0.2), p_only(10.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        mv.set_target_position(1.0, 0.0, 0.5);
        mv.update();

        let cmd = mv.command();
        assert_relative_eq!(cmd.pitch, 0.2, epsilon = 1e-6);
        assert_relative_eq!(cmd.roll, 0.0, epsilon = 1e-6);
        assert_relative_eq!(cmd.throttle, 5.0, epsilon = 1e-5);
        assert_relative_eq!(mv.status().target_velocity.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_error_rotated_by_heading() {
        let sensor = SimPositioning::new();
        sensor.set_yaw(FRAC_PI_2);
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(0.2), p_only(0.2), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        // Facing +Y: a +Y target is straight ahead
        mv.set_target_position(0.0, 1.0, 0.0);
        mv.update();
        assert_relative_eq!(mv.command().pitch, 0.2, epsilon = 1e-5);
        assert_relative_eq!(mv.command().roll, 0.0, epsilon = 1e-5);

        // ...and a +X target is to the left
        mv.set_target_position(1.0, 0.0, 0.0);
        mv.update();
        assert_relative_eq!(mv.command().pitch, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mv.command().roll, -0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_commands_clamped() {
        let sensor = SimPositioning::new();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(10.0), p_only(10.0), p_only(100.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        mv.set_target_position(5.0, -5.0, -5.0);
        mv.update();

        let cmd = mv.command();
        assert_relative_eq!(cmd.pitch, FRAC_PI_6);
        assert_relative_eq!(cmd.roll, -FRAC_PI_6);
        assert_relative_eq!(cmd.throttle, -50.0);
    }

    #[test]
    fn test_velocity_mode_bypasses_position_loop() {
        let sensor = SimPositioning::new();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(0.2), p_only(0.2), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        mv.set_target_position(3.0, 0.0, 0.0);
        mv.set_target_velocity(0.0, 0.5, 0.0);
        assert!(!mv.is_position_control());
        mv.update();

        assert_relative_eq!(mv.command().pitch, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mv.command().roll, 0.1, epsilon = 1e-6);

        // Body velocity feedback cancels the setpoint
        sensor.set_velocity(0.0, 0.5, 0.0);
        mv.update();
        assert_relative_eq!(mv.command().roll, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_offset_applied() {
        let sensor = SimPositioning::new();
        sensor.set_position(1.0, 2.0, 0.3);
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        mv.set_offset(&Pose::new(1.0, 2.0, 0.0, 0.0));
        mv.update();
        let p = mv.current_pose();
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_current_as_origin_aligns_heading() {
        let sensor = SimPositioning::new();
        sensor.set_position(2.0, 3.0, 0.0);
        sensor.set_yaw(FRAC_PI_2);
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();
        mv.set_current_as_origin().unwrap();

        // One metre along the captured heading is local +X
        sensor.set_position(2.0, 4.0, 0.0);
        mv.update();
        let p = mv.current_pose();
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.yaw, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mv.target_heading(), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_current_as_origin_needs_fix() {
        let sensor = SimPositioning::new();
        sensor.invalidate();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        assert!(matches!(mv.set_current_as_origin(), Err(MoveError::NoValidPose)));
        assert_eq!(mv.offset(), Pose::default());
    }

    #[test]
    fn test_invalid_samples_keep_last_values() {
        let sensor = SimPositioning::new();
        sensor.set_position(0.5, 0.0, 1.0);
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();
        mv.update();

        sensor.set_position(9.0, 9.0, 9.0);
        sensor.invalidate();
        mv.update();

        let p = mv.current_pose();
        assert_relative_eq!(p.x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(p.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reset_zeroes_command() {
        let sensor = SimPositioning::new();
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(0.2), p_only(0.2), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());
        mv.init().unwrap();

        mv.set_target_position(1.0, 1.0, 1.0);
        mv.update();
        assert!(mv.command().pitch > 0.0);

        mv.reset();
        assert_eq!(mv.command(), AttitudeCommand::default());
        assert_relative_eq!(mv.status().target_velocity.norm(), 0.0);
    }

    #[test]
    fn test_update_is_noop_before_init() {
        let sensor = SimPositioning::new();
        sensor.set_position(1.0, 0.0, 0.0);
        let mut position = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut velocity = [p_only(1.0), p_only(1.0), p_only(1.0)];
        let mut mv = Move::new(deps(&sensor, &mut position, &mut velocity), MoveConfig::default());

        mv.update();
        assert_eq!(mv.current_pose(), Pose::default());
    }
}
