//! Second-order low-pass (biquad) filter
//!
//! Used on the PID derivative term. Coefficients follow the standard
//! RBJ low-pass design and are evaluated once at configuration time;
//! the filter itself runs in transposed direct form II.

use core::f32::consts::PI;

/// Biquad low-pass filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    /// Transposed direct form II delay line
    d1: f32,
    d2: f32,
}

impl Biquad {
    /// Unity pass-through
    pub const fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            d1: 0.0,
            d2: 0.0,
        }
    }

    /// Design a low-pass filter
    ///
    /// # Arguments
    /// * `sample_freq` - Sampling frequency [Hz]
    /// * `cutoff_freq` - -3 dB cutoff [Hz]
    /// * `q` - Quality factor (0.707 for Butterworth)
    ///
    /// # Returns
    /// A pass-through filter when the cutoff is at or above Nyquist or any
    /// parameter is non-positive.
    pub fn low_pass(sample_freq: f32, cutoff_freq: f32, q: f32) -> Self {
        if !(sample_freq > 0.0 && cutoff_freq > 0.0 && q > 0.0) || cutoff_freq >= 0.5 * sample_freq {
            return Self::passthrough();
        }

        let omega = 2.0 * PI * cutoff_freq / sample_freq;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / (2.0 * q);
        let a0 = 1.0 + alpha;

        let b0 = (1.0 - cos_w) / 2.0 / a0;
        Self {
            b0,
            b1: (1.0 - cos_w) / a0,
            b2: b0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
            d1: 0.0,
            d2: 0.0,
        }
    }

    /// Filter one sample
    pub fn apply(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.d1;
        self.d1 = self.b1 * input - self.a1 * output + self.d2;
        self.d2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Clear the delay line, keeping coefficients
    pub fn reset(&mut self) {
        self.d1 = 0.0;
        self.d2 = 0.0;
    }

    /// (b0, b1, b2, a1, a2)
    pub fn coefficients(&self) -> (f32, f32, f32, f32, f32) {
        (self.b0, self.b1, self.b2, self.a1, self.a2)
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::passthrough()
    }
}
