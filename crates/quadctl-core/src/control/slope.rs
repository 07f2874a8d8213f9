//! Rate-of-change limiter
//!
//! Moves an output toward a target by at most a fixed step per call. The
//! flight tasks use it to ramp collective throttle on take-off, landing and
//! emergency descent.

use serde::{Deserialize, Serialize};

/// Slope limiter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeConfig {
    /// Largest change of the output per `update()` call
    pub max_step: f32,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        // 0.04 %/ms at the 2 ms stabilize period
        Self { max_step: 0.08 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SlopeLimiter {
    max_step: f32,
    target: f32,
    current: f32,
}

impl SlopeLimiter {
    pub fn new(config: SlopeConfig) -> Self {
        Self {
            max_step: config.max_step.abs(),
            target: 0.0,
            current: 0.0,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump the output without ramping
    pub fn set_current(&mut self, current: f32) {
        self.current = current;
    }

    /// Advance one step toward the target and return the new output
    pub fn update(&mut self, target: f32) -> f32 {
        self.target = target;
        self.advance()
    }

    /// Advance toward the last target set
    pub fn advance(&mut self) -> f32 {
        let delta = self.target - self.current;
        if delta.abs() <= self.max_step {
            self.current = self.target;
        } else {
            self.current += self.max_step.copysign(delta);
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn reached(&self) -> bool {
        self.current == self.target
    }
}
