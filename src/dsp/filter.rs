//! One-pole low-pass filter: the smoothing stage used by the tone stack and the
//! delay's feedback path.

/// A one-pole IIR low-pass: `y += coef * (x - y)`.
///
/// `coef` is the fraction of the remaining distance covered per sample
/// (1.0 passes the input through, values near 0 smooth heavily).
#[derive(Debug, Clone)]
pub struct OnePole {
    coef: f32,
    state: f32,
}

impl OnePole {
    pub fn new(coef: f32) -> Self {
        OnePole { coef, state: 0.0 }
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.coef * (input - self.state);
        self.state
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn lowpass_passes_dc() {
        let mut f = OnePole::new(0.1);

        // Feed DC signal (1.0): should converge to 1.0
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(
            (output - 1.0).abs() < 0.001,
            "Lowpass should pass DC, got {output}"
        );
    }

    #[test]
    fn first_step_is_coef() {
        let mut f = OnePole::new(0.3);
        assert!((f.process(1.0) - 0.3).abs() < 1e-7);
        assert!((f.process(0.0) - 0.21).abs() < 1e-7);
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = OnePole::new(0.1);

        // Nyquist-rate alternation is heavily smoothed
        let mut max_out = 0.0_f32;
        for i in 0..4410 {
            let input = (PI * i as f32).cos();
            let out = f.process(input);
            if i > 1000 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(
            max_out < 0.1,
            "One-pole should attenuate Nyquist, got amplitude {max_out}"
        );
    }

    #[test]
    fn reset_clears_state() {
        let mut f = OnePole::new(0.5);
        f.process(1.0);
        f.reset();
        assert_eq!(f.process(0.0), 0.0);
    }
}
