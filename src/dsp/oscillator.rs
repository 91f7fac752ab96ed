//! Low-frequency sine oscillator used to sweep delay times in the modulation pedals.

use std::f64::consts::PI;

/// A sine LFO with a normalized phase in `[0, 1)`.
///
/// The rate is passed per block rather than stored, since it follows a knob.
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f64,
    sample_rate: f64,
}

impl Lfo {
    pub fn new(sample_rate: f64) -> Self {
        Lfo {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample for a rate in Hz.
    pub fn phase_inc(&self, rate_hz: f64) -> f64 {
        rate_hz / self.sample_rate
    }

    /// Current value in `[-1, 1]`.
    #[inline]
    pub fn value(&self) -> f64 {
        (2.0 * PI * self.phase).sin()
    }

    /// Return the current value, then advance by `inc`.
    #[inline]
    pub fn next_sample(&mut self, inc: f64) -> f64 {
        let sample = self.value();
        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
