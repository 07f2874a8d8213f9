//! Aggregate flight tuning
//!
//! One serde record holding every loop gain and filter setting, so a host
//! can load a complete tune from a single JSON document. Missing fields
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::control::{ChassisConfig, MoveConfig, PidConfig, SlopeConfig};
use crate::estimation::{EkfConfig, Estimator, EstimatorKind, MahonyConfig, MahonyFilter, QuaternionEkf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Roll / pitch / yaw angle loop [rad → rad/s]
    pub angle_pids: [PidConfig; 3],
    /// Roll / pitch / yaw rate loop [rad/s → mixer %]
    pub rate_pids: [PidConfig; 3],
    /// X / Y / Z position loop [m → m/s]
    pub position_pids: [PidConfig; 3],
    /// X / Y / Z velocity loop [m/s → rad, rad, %]
    pub velocity_pids: [PidConfig; 3],
    pub estimator: EstimatorKind,
    pub mahony: MahonyConfig,
    pub ekf: EkfConfig,
    pub chassis: ChassisConfig,
    pub movement: MoveConfig,
    /// Take-off / landing throttle ramp
    pub throttle_ramp: SlopeConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        let angle = PidConfig::with_gains(4.0, 0.0, 0.0).limits(4.0, 0.0);
        let rate = PidConfig::with_gains(20.0, 5.0, 0.5)
            .limits(30.0, 10.0)
            .diff_filter(500.0, 50.0, 0.707);
        let position = PidConfig::with_gains(1.0, 0.0, 0.0).limits(1.0, 0.0);
        let horizontal = PidConfig::with_gains(0.3, 0.05, 0.0).limits(0.5, 0.2);
        let vertical = PidConfig::with_gains(20.0, 5.0, 0.0).limits(50.0, 20.0);

        Self {
            angle_pids: [angle; 3],
            rate_pids: [rate; 3],
            position_pids: [position; 3],
            velocity_pids: [horizontal, horizontal, vertical],
            estimator: EstimatorKind::default(),
            mahony: MahonyConfig::default(),
            ekf: EkfConfig::default(),
            chassis: ChassisConfig::default(),
            movement: MoveConfig::default(),
            throttle_ramp: SlopeConfig::default(),
        }
    }
}

impl FlightConfig {
    /// Build the selected attitude estimator
    pub fn build_estimator(&self) -> Estimator {
        match self.estimator {
            EstimatorKind::Mahony => MahonyFilter::new(self.mahony).into(),
            EstimatorKind::Ekf => QuaternionEkf::new(self.ekf).into(),
        }
    }
}
