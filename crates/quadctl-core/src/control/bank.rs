//! Controller storage
//!
//! Owns the twelve loop controllers so that `Chassis` and `Move` can borrow
//! them for the lifetime of a flight.

use super::pid::PidController;
use crate::config::FlightConfig;

/// Mutable borrows of every controller, ready to drop into
/// `ChassisDependencies` and `MoveDependencies`
pub struct LentPids<'a> {
    pub angle: [Option<&'a mut PidController>; 3],
    pub rate: [Option<&'a mut PidController>; 3],
    pub position: [Option<&'a mut PidController>; 3],
    pub velocity: [Option<&'a mut PidController>; 3],
}

#[derive(Debug, Clone)]
pub struct ControllerBank {
    angle: [PidController; 3],
    rate: [PidController; 3],
    position: [PidController; 3],
    velocity: [PidController; 3],
}

impl ControllerBank {
    pub fn new(config: &FlightConfig) -> Self {
        Self {
            angle: config.angle_pids.map(PidController::new),
            rate: config.rate_pids.map(PidController::new),
            position: config.position_pids.map(PidController::new),
            velocity: config.velocity_pids.map(PidController::new),
        }
    }

    pub fn lend(&mut self) -> LentPids<'_> {
        LentPids {
            angle: self.angle.each_mut().map(Some),
            rate: self.rate.each_mut().map(Some),
            position: self.position.each_mut().map(Some),
            velocity: self.velocity.each_mut().map(Some),
        }
    }

    pub fn reset_all(&mut self) {
        for pid in self
            .angle
            .iter_mut()
            .chain(self.rate.iter_mut())
            .chain(self.position.iter_mut())
            .chain(self.velocity.iter_mut())
        {
            pid.reset();
        }
    }

    pub fn angle(&self) -> &[PidController; 3] {
        &self.angle
    }

    pub fn rate(&self) -> &[PidController; 3] {
        &self.rate
    }

    pub fn position(&self) -> &[PidController; 3] {
        &self.position
    }

    pub fn velocity(&self) -> &[PidController; 3] {
        &self.velocity
    }
}

impl Default for ControllerBank {
    fn default() -> Self {
        Self::new(&FlightConfig::default())
    }
}
