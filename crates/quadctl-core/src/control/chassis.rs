//! Attitude / rate cascade and X-quad mixer
//!
//! ```text
//! target angle ──► angle PID ──► target rate ──► rate PID ──► mixer ──► motors
//!                     ▲                            ▲
//!               estimated angle                body rates
//! ```
//!
//! Motor layout (top view, X configuration):
//!
//! ```text
//!   FL(1)   FR(0)
//!       \ /
//!       / \
//!   RL(2)   RR(3)
//! ```

use log::{info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pid::PidController;
use crate::estimation::AttitudeSource;
use crate::hal::Motor;
use crate::math::{clamp_abs, clamp_range, wrap_pi, EulerAngles};

/// Motor slot, numbered as wired on the flight controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorPosition {
    FrontRight = 0,
    FrontLeft = 1,
    RearLeft = 2,
    RearRight = 3,
}

impl MotorPosition {
    pub const ALL: [MotorPosition; 4] = [
        MotorPosition::FrontRight,
        MotorPosition::FrontLeft,
        MotorPosition::RearLeft,
        MotorPosition::RearRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Rotational axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How collective throttle is formed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleMode {
    /// Use the override value as is
    Direct,
    /// `hover_throttle + additive`
    #[default]
    Additive,
}

#[derive(Debug, Error)]
pub enum ChassisError {
    #[error("Motor {0:?} not attached")]
    MissingMotor(MotorPosition),
    #[error("{0:?} angle PID not attached")]
    MissingAnglePid(Axis),
    #[error("{0:?} rate PID not attached")]
    MissingRatePid(Axis),
    #[error("Chassis not initialized")]
    NotInitialized,
}

/// Borrowed collaborators, indexed by [`MotorPosition`] and [`Axis`]
#[derive(Default)]
pub struct ChassisDependencies<'a> {
    pub motors: [Option<&'a mut dyn Motor>; 4],
    pub angle_pids: [Option<&'a mut PidController>; 3],
    pub rate_pids: [Option<&'a mut PidController>; 3],
}

/// Chassis tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    /// Collective throttle that holds altitude [%]
    pub hover_throttle: f32,
    /// Per-motor saturation [%]
    pub motor_limit: f32,
    /// Sign applied to the roll / pitch / yaw commands before mixing, to
    /// match the IMU mounting and propeller direction of the airframe
    pub axis_signs: [f32; 3],
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            hover_throttle: 50.0,
            motor_limit: 100.0,
            axis_signs: [1.0, 1.0, 1.0],
        }
    }
}

/// Snapshot of the last cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChassisStatus {
    /// Attitude feedback used [rad]
    pub attitude: EulerAngles,
    /// Body rate feedback used [rad/s]
    pub body_rates: Vector3<f32>,
    /// Angle loop output [rad/s]
    pub target_rates: Vector3<f32>,
    /// Rate loop output, before mixing (roll, pitch, yaw)
    pub commands: Vector3<f32>,
    /// Resolved collective throttle [%]
    pub throttle: f32,
    /// Per-motor output indexed by [`MotorPosition`] [%]
    pub motor_outputs: [f32; 4],
    pub armed: bool,
}

/// X-quad mixer
///
/// ```text
/// FR = T − roll + pitch − yaw
/// RR = T − roll − pitch + yaw
/// RL = T + roll − pitch − yaw
/// FL = T + roll + pitch + yaw
/// ```
///
/// Returns outputs indexed by [`MotorPosition`], each clamped to `±limit`.
pub fn mix_x_quad(throttle: f32, roll: f32, pitch: f32, yaw: f32, limit: f32) -> [f32; 4] {
    let mut out = [0.0; 4];
    out[MotorPosition::FrontRight.index()] = throttle - roll + pitch - yaw;
    out[MotorPosition::RearRight.index()] = throttle - roll - pitch + yaw;
    out[MotorPosition::RearLeft.index()] = throttle + roll - pitch - yaw;
    out[MotorPosition::FrontLeft.index()] = throttle + roll + pitch + yaw;

    for v in out.iter_mut() {
        *v = clamp_abs(*v, limit);
    }
    out
}

pub struct Chassis<'a> {
    deps: ChassisDependencies<'a>,
    config: ChassisConfig,
    initialized: bool,
    armed: bool,
    target: EulerAngles,
    throttle_mode: ThrottleMode,
    throttle_override: f32,
    throttle_additive: f32,
    status: ChassisStatus,
}

impl<'a> Chassis<'a> {
    pub fn new(deps: ChassisDependencies<'a>, config: ChassisConfig) -> Self {
        Self {
            deps,
            config,
            initialized: false,
            armed: false,
            target: EulerAngles::default(),
            throttle_mode: ThrottleMode::default(),
            throttle_override: 0.0,
            throttle_additive: 0.0,
            status: ChassisStatus::default(),
        }
    }

    /// Validate that every motor and PID is attached
    ///
    /// A successful init leaves the chassis armed.
    pub fn init(&mut self) -> Result<(), ChassisError> {
        self.initialized = false;

        if let Err(err) = self.validate() {
            warn!("chassis init failed: {err}");
            return Err(err);
        }

        self.initialized = true;
        self.armed = true;
        self.status.armed = true;
        info!("chassis initialized");
        Ok(())
    }

    fn validate(&self) -> Result<(), ChassisError> {
        for pos in MotorPosition::ALL {
            if self.deps.motors[pos.index()].is_none() {
                return Err(ChassisError::MissingMotor(pos));
            }
        }
        for axis in Axis::ALL {
            if self.deps.angle_pids[axis.index()].is_none() {
                return Err(ChassisError::MissingAnglePid(axis));
            }
            if self.deps.rate_pids[axis.index()].is_none() {
                return Err(ChassisError::MissingRatePid(axis));
            }
        }
        Ok(())
    }

    /// Run one attitude cycle and write the motors
    pub fn update<A: AttitudeSource + ?Sized>(&mut self, feedback: &A) {
        if !self.initialized {
            return;
        }

        let attitude = feedback.attitude();
        let rates = feedback.body_rates();
        let current = attitude.to_vector();
        let target = self.target.to_vector();

        let mut target_rates = Vector3::zeros();
        for axis in Axis::ALL {
            let i = axis.index();
            // Feed the angle loop a setpoint whose error is already wrapped
            let setpoint = match axis {
                Axis::Yaw => current[i] + wrap_pi(target[i] - current[i]),
                _ => target[i],
            };
            if let Some(pid) = self.deps.angle_pids[i].as_deref_mut() {
                target_rates[i] = pid.step(setpoint, current[i]);
            }
        }

        let mut commands = Vector3::zeros();
        for axis in Axis::ALL {
            let i = axis.index();
            if let Some(pid) = self.deps.rate_pids[i].as_deref_mut() {
                commands[i] = pid.step(target_rates[i], rates[i]) * self.config.axis_signs[i];
            }
        }

        let throttle = self.resolve_throttle();
        let outputs = if self.armed {
            mix_x_quad(
                throttle,
                commands[Axis::Roll.index()],
                commands[Axis::Pitch.index()],
                commands[Axis::Yaw.index()],
                self.config.motor_limit,
            )
        } else {
            [0.0; 4]
        };
        self.write_motors(&outputs);

        self.status = ChassisStatus {
            attitude,
            body_rates: rates,
            target_rates,
            commands,
            throttle,
            motor_outputs: outputs,
            armed: self.armed,
        };
    }

    fn resolve_throttle(&self) -> f32 {
        let raw = match self.throttle_mode {
            ThrottleMode::Direct => self.throttle_override,
            ThrottleMode::Additive => self.config.hover_throttle + self.throttle_additive,
        };
        clamp_range(raw, 0.0, 100.0)
    }

    fn write_motors(&mut self, outputs: &[f32; 4]) {
        for (slot, value) in self.deps.motors.iter_mut().zip(outputs) {
            if let Some(motor) = slot.as_deref_mut() {
                motor.set_throttle(*value);
            }
        }
    }

    /// Cut all motors immediately; stays disarmed until [`Chassis::arm`]
    pub fn disarm(&mut self) {
        self.armed = false;
        self.write_motors(&[0.0; 4]);
        self.status.motor_outputs = [0.0; 4];
        self.status.armed = false;
    }

    /// Re-enable the mixer after a disarm
    pub fn arm(&mut self) -> Result<(), ChassisError> {
        if !self.initialized {
            warn!("chassis arm rejected: not initialized");
            return Err(ChassisError::NotInitialized);
        }
        self.reset_controllers();
        self.armed = true;
        self.status.armed = true;
        Ok(())
    }

    /// Clear the running state of all six PIDs
    pub fn reset_controllers(&mut self) {
        for pid in self
            .deps
            .angle_pids
            .iter_mut()
            .chain(self.deps.rate_pids.iter_mut())
            .flatten()
        {
            pid.reset();
        }
    }

    /// Target attitude [rad]
    pub fn set_target_attitude(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.target = EulerAngles::new(roll, pitch, yaw);
    }

    /// Switches to [`ThrottleMode::Direct`]
    pub fn set_throttle_override(&mut self, throttle: f32) {
        self.throttle_override = clamp_range(throttle, 0.0, 100.0);
        self.throttle_mode = ThrottleMode::Direct;
    }

    /// Switches to [`ThrottleMode::Additive`]
    pub fn set_throttle_additive(&mut self, additive: f32) {
        self.throttle_additive = additive;
        self.throttle_mode = ThrottleMode::Additive;
    }

    pub fn set_throttle_mode(&mut self, mode: ThrottleMode) {
        self.throttle_mode = mode;
    }

    pub fn throttle_mode(&self) -> ThrottleMode {
        self.throttle_mode
    }

    pub fn target_attitude(&self) -> EulerAngles {
        self.target
    }

    pub fn status(&self) -> &ChassisStatus {
        &self.status
    }

    pub fn config(&self) -> &ChassisConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
