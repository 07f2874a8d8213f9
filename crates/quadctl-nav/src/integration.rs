//! Flight task context
//!
//! [`FlightTasks`] owns every flight component and exposes one entry point
//! per periodic loop. The host scheduler calls them at fixed rates:
//!
//! ```text
//! attitude_tick()    500 Hz   IMU -> estimator
//! stabilize_tick()   500 Hz   throttle ramp, position loop every N ticks, chassis
//! navigation_tick()  slower   track -> guide pose -> move target
//! ```
//!
//! Within one scheduler period `attitude_tick` must run before
//! `stabilize_tick`.

use log::{info, warn};
use quadctl_core::control::{
    Chassis, ChassisDependencies, ChassisError, LentPids, Move, MoveDependencies, MoveError,
    SlopeLimiter,
};
use quadctl_core::estimation::{AttitudeError, AttitudeManager};
use quadctl_core::hal::{Imu, Motor, PositioningSensor};
use thiserror::Error;

use crate::config::{MissionConfig, ScheduleConfig};
use crate::track::{Track, TrackState};
use crate::NavigationError;

/// Flight task errors
#[derive(Debug, Error)]
pub enum FlightError {
    #[error("Attitude error: {0}")]
    Attitude(#[from] AttitudeError),
    #[error("Chassis error: {0}")]
    Chassis(#[from] ChassisError),
    #[error("Move error: {0}")]
    Move(#[from] MoveError),
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),
    #[error("Flight tasks not initialized")]
    NotInitialized,
}

/// Drivers and controllers lent to the flight tasks
pub struct FlightDependencies<'a> {
    pub imu: Option<&'a mut dyn Imu>,
    pub positioning: Option<&'a dyn PositioningSensor>,
    pub motors: [Option<&'a mut dyn Motor>; 4],
    pub pids: LentPids<'a>,
}

pub struct FlightTasks<'a, 'p> {
    attitude: AttitudeManager<'a>,
    chassis: Chassis<'a>,
    movement: Move<'a>,
    track: Track<'p, 'a>,
    ramp: SlopeLimiter,
    schedule: ScheduleConfig,
    hover_throttle: f32,
    stabilize_count: u32,
    initialized: bool,
}

impl<'a, 'p> FlightTasks<'a, 'p> {
    pub fn new(deps: FlightDependencies<'a>, track: Track<'p, 'a>, config: &MissionConfig) -> Self {
        let flight = &config.flight;
        let LentPids {
            angle,
            rate,
            position,
            velocity,
        } = deps.pids;

        let chassis = Chassis::new(
            ChassisDependencies {
                motors: deps.motors,
                angle_pids: angle,
                rate_pids: rate,
            },
            flight.chassis,
        );
        let movement = Move::new(
            MoveDependencies {
                sensor: deps.positioning,
                position_pids: position,
                velocity_pids: velocity,
            },
            flight.movement,
        );

        Self {
            attitude: AttitudeManager::new(deps.imu, Some(flight.build_estimator())),
            chassis,
            movement,
            track,
            ramp: SlopeLimiter::new(flight.throttle_ramp),
            schedule: config.schedule,
            hover_throttle: flight.chassis.hover_throttle,
            stabilize_count: 0,
            initialized: false,
        }
    }

    /// Bring up every component
    ///
    /// The position target is set to the current pose and the chassis is
    /// left disarmed until [`FlightTasks::takeoff`].
    pub fn init(&mut self) -> Result<(), FlightError> {
        self.initialized = false;

        self.attitude.init()?;
        self.chassis.init()?;
        self.movement.init()?;

        self.chassis.disarm();
        self.ramp.set_current(0.0);
        self.ramp.set_target(0.0);
        self.chassis.set_throttle_override(0.0);

        // Hold where we are
        self.movement.update();
        let here = self.movement.current_pose();
        self.movement.set_target_pose(&here);

        self.stabilize_count = 0;
        self.initialized = true;
        info!("flight tasks initialized");
        Ok(())
    }

    /// IMU read and attitude estimation
    pub fn attitude_tick(&mut self) {
        if self.initialized {
            self.attitude.update();
        }
    }

    /// Throttle ramp, position loop (divided) and attitude loop
    pub fn stabilize_tick(&mut self) {
        if !self.initialized {
            return;
        }

        let base = self.ramp.advance();

        let divider = self.schedule.position_loop_divider.max(1);
        self.stabilize_count += 1;
        if self.stabilize_count >= divider {
            self.stabilize_count = 0;
            if self.chassis.is_armed() {
                self.movement.update();
                let command = self.movement.command();
                self.chassis.set_target_attitude(
                    command.roll,
                    command.pitch,
                    self.movement.target_heading(),
                );
            }
        }

        let correction = if self.is_airborne() {
            self.movement.command().throttle
        } else {
            0.0
        };
        self.chassis.set_throttle_override(base + correction);
        self.chassis.update(&self.attitude);
    }

    /// Advance the mission and retarget the position loop
    pub fn navigation_tick(&mut self) {
        if !self.initialized || self.track.state() != TrackState::Executing {
            return;
        }
        let pose = self.movement.current_pose();
        self.track.process(&pose);
        let guide = self.track.current_guide_pose();
        self.movement.set_target_pose(&guide);
    }

    /// Arm, capture the local origin and ramp up to hover
    pub fn takeoff(&mut self) -> Result<(), FlightError> {
        if !self.initialized {
            warn!("takeoff rejected: not initialized");
            return Err(FlightError::NotInitialized);
        }
        self.movement.set_current_as_origin()?;
        self.movement.reset();
        self.movement.update();
        let here = self.movement.current_pose();
        self.movement.set_target_pose(&here);

        self.chassis.arm()?;
        self.ramp.set_target(self.hover_throttle);
        info!("takeoff: ramping to {:.1}% throttle", self.hover_throttle);
        Ok(())
    }

    /// Ramp down to zero throttle
    pub fn land(&mut self) {
        self.ramp.set_target(0.0);
        info!("landing");
    }

    /// Start the mission track
    pub fn start_mission(&mut self) -> Result<(), FlightError> {
        self.track.start_track()?;
        Ok(())
    }

    /// Cut the motors and freeze the mission
    pub fn emergency_stop(&mut self) {
        self.chassis.disarm();
        self.ramp.set_current(0.0);
        self.ramp.set_target(0.0);
        self.movement.reset();
        self.track.pause();
        warn!("emergency stop");
    }

    /// Ramp has reached a non-zero throttle target
    pub fn is_airborne(&self) -> bool {
        self.chassis.is_armed() && self.ramp.target() > 0.0 && self.ramp.reached()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn attitude(&self) -> &AttitudeManager<'a> {
        &self.attitude
    }

    pub fn chassis(&self) -> &Chassis<'a> {
        &self.chassis
    }

    pub fn movement(&self) -> &Move<'a> {
        &self.movement
    }

    pub fn track(&self) -> &Track<'p, 'a> {
        &self.track
    }

    pub fn track_mut(&mut self) -> &mut Track<'p, 'a> {
        &mut self.track
    }
}
