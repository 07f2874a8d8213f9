//! quadctl navigation
//!
//! Waypoint navigation and the flight task context that ties the core
//! components together.
//!
//! # Architecture
//!
//! ```text
//!   Track ──► Path ──► guide pose ──► Move ──► attitude cmd ──► Chassis ──► motors
//!   (stages)  (waypoints)                ▲                        ▲
//!                                positioning sensor        AttitudeManager ◄── IMU
//! ```
//!
//! # Components
//!
//! - [`point`]: Target pose with debounced arrival
//! - [`path`]: Waypoint sequence with interpolated guide pose
//! - [`track`]: Multi-stage missions with completion callbacks
//! - [`config`]: Navigation, scheduling and mission configuration
//! - [`integration`]: [`FlightTasks`] application context

pub mod config;
pub mod integration;
pub mod path;
pub mod point;
pub mod track;

use thiserror::Error;

pub use config::{MissionConfig, NavigationConfig, ScheduleConfig};
pub use integration::{FlightDependencies, FlightError, FlightTasks};
pub use path::{Path, PathState};
pub use point::{Point, PoseDiff, ToleranceParams};
pub use track::{Track, TrackState};

/// Navigation errors
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Path is full ({capacity} waypoints)")]
    PathFull { capacity: usize },
    #[error("Track is full ({capacity} stages)")]
    TrackFull { capacity: usize },
    #[error("Path has no waypoints")]
    EmptyPath,
    #[error("Track has no stages")]
    EmptyTrack,
    #[error("Invalid stage {index}: track has {count} stages")]
    InvalidStage { index: usize, count: usize },
}
