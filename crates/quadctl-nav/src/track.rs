//! Multi-stage mission sequencing
//!
//! A [`Track`] runs borrowed [`Path`]s one after another. When a stage's
//! path completes, its optional callback receives the stage index and the
//! next stage is started:
//!
//! ```text
//!   Idle ──start_track()──► Executing ──last stage done──► Completed
//!                            │     ▲
//!                     pause()│     │resume()
//!                            ▼     │
//!                            Paused
//! ```

use heapless::Vec;
use log::{debug, info, warn};
use quadctl_core::Pose;
use serde::{Deserialize, Serialize};

use crate::path::{Path, DEFAULT_PATH_CAPACITY};
use crate::NavigationError;

/// Default stage capacity of a [`Track`]
pub const DEFAULT_TRACK_CAPACITY: usize = 8;

/// Called with the index of the stage that just completed
pub type StageCallback<'p> = &'p mut dyn FnMut(usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    #[default]
    Idle,
    Executing,
    /// Frozen; paths keep their state
    Paused,
    Completed,
}

struct PathStage<'p, 'a, const P: usize> {
    path: &'p mut Path<'a, P>,
    callback: Option<StageCallback<'p>>,
}

pub struct Track<
    'p,
    'a,
    const N: usize = DEFAULT_TRACK_CAPACITY,
    const P: usize = DEFAULT_PATH_CAPACITY,
> {
    stages: Vec<PathStage<'p, 'a, P>, N>,
    current: usize,
    state: TrackState,
}

impl<'p, 'a, const N: usize, const P: usize> Track<'p, 'a, N, P> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            current: 0,
            state: TrackState::Idle,
        }
    }

    /// Append a stage; paths without waypoints are rejected
    pub fn add_stage(
        &mut self,
        path: &'p mut Path<'a, P>,
        callback: Option<StageCallback<'p>>,
    ) -> Result<(), NavigationError> {
        if path.target_count() == 0 {
            return Err(NavigationError::EmptyPath);
        }
        self.stages
            .push(PathStage { path, callback })
            .map_err(|_| NavigationError::TrackFull { capacity: N })
    }

    /// Remove every stage and return to `Idle`
    pub fn clear_stages(&mut self) {
        self.reset_track();
        self.stages.clear();
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn start_track(&mut self) -> Result<(), NavigationError> {
        if self.stages.is_empty() {
            warn!("track start rejected: no stages");
            return Err(NavigationError::EmptyTrack);
        }
        self.current = 0;
        self.state = TrackState::Executing;
        self.start_current()?;
        info!("track started with {} stages", self.stages.len());
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == TrackState::Executing {
            self.state = TrackState::Paused;
            debug!("track paused at stage {}", self.current);
        }
    }

    pub fn resume(&mut self) {
        if self.state == TrackState::Paused {
            self.state = TrackState::Executing;
            debug!("track resumed at stage {}", self.current);
        }
    }

    /// Reset every path and return to `Idle`
    pub fn reset_track(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.path.reset_path();
        }
        self.current = 0;
        self.state = TrackState::Idle;
    }

    /// Jump to an arbitrary stage
    ///
    /// The target path is reset, and restarted right away when the track is
    /// executing or paused.
    pub fn switch_to_stage(&mut self, index: usize) -> Result<(), NavigationError> {
        let count = self.stages.len();
        let Some(stage) = self.stages.get_mut(index) else {
            warn!("switch to stage {index} rejected: {count} stages");
            return Err(NavigationError::InvalidStage { index, count });
        };
        stage.path.reset_path();
        self.current = index;

        if matches!(self.state, TrackState::Executing | TrackState::Paused) {
            self.start_current()?;
        }
        info!("switched to stage {index}");
        Ok(())
    }

    /// Feed the current pose; returns `true` once every stage is done
    pub fn process(&mut self, current: &Pose) -> bool {
        match self.state {
            TrackState::Idle | TrackState::Paused => return false,
            TrackState::Completed => return true,
            TrackState::Executing => {}
        }

        let index = self.current;
        let Some(stage) = self.stages.get_mut(index) else {
            return false;
        };
        if stage.path.is_reached(current) {
            if let Some(callback) = stage.callback.as_deref_mut() {
                callback(index);
            }
            self.advance();
        }
        self.state == TrackState::Completed
    }

    fn advance(&mut self) {
        let next = self.current + 1;
        if next >= self.stages.len() {
            self.state = TrackState::Completed;
            info!("track completed");
            return;
        }
        self.current = next;
        debug!("track advancing to stage {next}");
        if let Err(err) = self.start_current() {
            warn!("stage {next} failed to start: {err}");
        }
    }

    fn start_current(&mut self) -> Result<(), NavigationError> {
        match self.stages.get_mut(self.current) {
            Some(stage) => stage.path.start_path(),
            None => Err(NavigationError::InvalidStage {
                index: self.current,
                count: self.stages.len(),
            }),
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Stays on the last stage once completed
    pub fn current_stage_index(&self) -> usize {
        self.current
    }

    /// Fraction of the whole track covered, in [0, 1]
    pub fn total_progress(&self) -> f32 {
        let count = self.stages.len();
        if count == 0 {
            return 0.0;
        }
        match self.state {
            TrackState::Idle => 0.0,
            TrackState::Completed => 1.0,
            TrackState::Executing | TrackState::Paused => {
                let stage = self
                    .stages
                    .get(self.current)
                    .map(|s| s.path.progress())
                    .unwrap_or(0.0);
                ((self.current as f32 + stage) / count as f32).min(1.0)
            }
        }
    }

    /// Guide pose of the current stage, or the origin without stages
    pub fn current_guide_pose(&self) -> Pose {
        self.stages
            .get(self.current)
            .map(|s| s.path.current_guide_pose())
            .unwrap_or_default()
    }
}

impl<const N: usize, const P: usize> Default for Track<'_, '_, N, P> {
    fn default() -> Self {
        Self::new()
    }
}
