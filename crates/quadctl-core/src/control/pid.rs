//! Single-axis PID controller
//!
//! Shared primitive for every loop in the cascade (angle, rate, position,
//! velocity). Features:
//! - Positional or incremental output ([`PidMode`])
//! - Term selection ([`PidType`])
//! - Integral separation, anti-saturation and an error deadband on the
//!   integral path
//! - Optional biquad low-pass on the derivative
//!
//! The output is always clamped to `±max_output` as the last step.

use serde::{Deserialize, Serialize};

use super::filter::Biquad;
use crate::math::clamp_abs;

/// How the output is formed from the terms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PidMode {
    /// output = P + I + D
    #[default]
    Position,
    /// output += ΔP + ΔI + ΔD
    Incremental,
}

/// Which terms are active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PidType {
    P,
    PI,
    PD,
    #[default]
    PID,
}

impl PidType {
    pub fn has_integral(self) -> bool {
        matches!(self, PidType::PI | PidType::PID)
    }

    pub fn has_derivative(self) -> bool {
        matches!(self, PidType::PD | PidType::PID)
    }
}

/// PID tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Output saturation (symmetric)
    pub max_output: f32,
    /// Saturation of the integral contribution `|integral · ki|`
    pub max_integral: f32,
    /// Integrate only while `|error|` is below this; ≤ 0 disables separation
    pub integral_separation_threshold: f32,
    /// Errors with magnitude at or below this contribute nothing to the integral
    pub error_deadband: f32,
    /// Freeze the integral while the output is saturated
    pub anti_saturation_enabled: bool,
    pub diff_filter_enabled: bool,
    /// Derivative filter sampling frequency [Hz]
    pub diff_filter_sampling_freq: f32,
    /// Derivative filter cutoff [Hz]
    pub diff_filter_cutoff_freq: f32,
    pub diff_filter_q: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            max_output: 100.0,
            max_integral: 50.0,
            integral_separation_threshold: 0.0,
            error_deadband: 0.0,
            anti_saturation_enabled: true,
            diff_filter_enabled: false,
            diff_filter_sampling_freq: 500.0,
            diff_filter_cutoff_freq: 50.0,
            diff_filter_q: 0.707,
        }
    }
}

impl PidConfig {
    /// Gains with default limits
    pub fn with_gains(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            ..Self::default()
        }
    }

    /// Builder-style output / integral limits
    pub fn limits(mut self, max_output: f32, max_integral: f32) -> Self {
        self.max_output = max_output;
        self.max_integral = max_integral;
        self
    }

    /// Builder-style derivative filter
    pub fn diff_filter(mut self, sampling_freq: f32, cutoff_freq: f32, q: f32) -> Self {
        self.diff_filter_enabled = true;
        self.diff_filter_sampling_freq = sampling_freq;
        self.diff_filter_cutoff_freq = cutoff_freq;
        self.diff_filter_q = q;
        self
    }
}

/// Running controller state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub target: f32,
    pub actual: f32,
    pub error: f32,
    pub last_error: f32,
    pub prev_error: f32,
    pub integral: f32,
    pub differential: f32,
    pub output: f32,
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
    state: PidState,
    diff_filter: Biquad,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        let diff_filter = Biquad::low_pass(
            config.diff_filter_sampling_freq,
            config.diff_filter_cutoff_freq,
            config.diff_filter_q,
        );

        Self {
            config,
            state: PidState::default(),
            diff_filter,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.state.target = target;
    }

    /// Advance one control period
    ///
    /// # Arguments
    /// * `actual` - Measured process value
    /// * `mode` - Positional or incremental output
    /// * `kind` - Active terms
    ///
    /// # Returns
    /// The clamped output, also kept in [`PidState::output`].
    pub fn update(&mut self, actual: f32, mode: PidMode, kind: PidType) -> f32 {
        let cfg = &self.config;
        let st = &mut self.state;

        st.actual = actual;
        st.error = st.target - actual;

        let deadbanded = if st.error.abs() <= cfg.error_deadband {
            0.0
        } else {
            st.error
        };

        if kind.has_integral() && cfg.ki != 0.0 {
            let separated =
                cfg.integral_separation_threshold > 0.0 && st.error.abs() >= cfg.integral_separation_threshold;
            let saturated = cfg.anti_saturation_enabled && st.output.abs() >= cfg.max_output.abs();

            if !separated && !saturated {
                st.integral += deadbanded;
            }
            st.integral = clamp_abs(st.integral, cfg.max_integral / cfg.ki.abs());
        }

        st.differential = 0.0;
        if kind.has_derivative() {
            let raw = st.error - st.last_error;
            st.differential = if cfg.diff_filter_enabled && cfg.kd != 0.0 {
                self.diff_filter.apply(raw)
            } else {
                raw
            };
        }

        let i_active = kind.has_integral();
        let d_active = kind.has_derivative();

        let output = match mode {
            PidMode::Position => {
                let mut out = cfg.kp * st.error;
                if i_active {
                    out += cfg.ki * st.integral;
                }
                if d_active {
                    out += cfg.kd * st.differential;
                }
                out
            }
            PidMode::Incremental => {
                let mut delta = cfg.kp * (st.error - st.last_error);
                if i_active {
                    delta += cfg.ki * deadbanded;
                }
                if d_active {
                    delta += cfg.kd * (st.error - 2.0 * st.last_error + st.prev_error);
                }
                st.output + delta
            }
        };

        st.output = if output.is_finite() {
            clamp_abs(output, cfg.max_output)
        } else {
            // Keep the last good value rather than latching NaN
            clamp_abs(st.output, cfg.max_output)
        };

        st.prev_error = st.last_error;
        st.last_error = st.error;

        st.output
    }

    /// `set_target` followed by a positional full-PID update
    pub fn step(&mut self, target: f32, actual: f32) -> f32 {
        self.set_target(target);
        self.update(actual, PidMode::Position, PidType::PID)
    }

    /// Zero all running state and filter history; configuration is kept
    pub fn reset(&mut self) {
        self.state = PidState::default();
        self.diff_filter.reset();
    }

    pub fn clear_integral(&mut self) {
        self.state.integral = 0.0;
    }

    pub fn output(&self) -> f32 {
        self.state.output
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidConfig::default())
    }
}
