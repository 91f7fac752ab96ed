//! Compressor effect: sustain-style dynamics leveling.
//!
//! A per-sample envelope follower drives a simple gain computer: once the
//! envelope rises above the threshold, gain is pulled down to `threshold / envelope`.
//! Makeup gain restores level and the result is hard-limited to ±0.95.

use std::sync::Arc;

use super::envelope::EnvelopeFollower;

/// Release coefficient of the envelope follower (fixed, not a knob).
const RELEASE_COEF: f32 = 0.005;
/// Output ceiling.
const CEILING: f32 = 0.95;

crate::param_table! {
    pub struct CompressorParams {
        level: 0.5,
        attack: 0.5,
        sustain: 0.5,
    }
}

/// A mono sustainer/compressor.
#[derive(Debug)]
pub struct Compressor {
    params: Arc<CompressorParams>,
    envelope: EnvelopeFollower,
}

impl Compressor {
    pub fn new(params: Arc<CompressorParams>) -> Self {
        Self {
            params,
            envelope: EnvelopeFollower::new(0.0, RELEASE_COEF),
        }
    }

    pub fn params(&self) -> &Arc<CompressorParams> {
        &self.params
    }

    /// Gain-reduction threshold for a sustain knob position.
    #[inline]
    fn threshold(sustain: f32) -> f32 {
        1.0 - sustain * 0.8
    }

    /// Process a block in place.
    pub fn process_block(&mut self, block: &mut [f32]) {
        self.envelope.attack = 0.01 + self.params.attack.get() * 0.1;
        let threshold = Self::threshold(self.params.sustain.get());
        let makeup = 1.0 + self.params.level.get() * 3.0;

        for sample in block.iter_mut() {
            let env = self.envelope.next(sample.abs());
            let gain = if env > threshold {
                threshold / (env + 0.001)
            } else {
                1.0
            };
            *sample = (*sample * gain * makeup).clamp(-CEILING, CEILING);
        }
    }

    /// Current envelope level (for metering).
    pub fn envelope(&self) -> f32 {
        self.envelope.level()
    }

    pub fn reset(&mut self) {
        self.envelope.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(comp: &mut Compressor, input: f32) -> f32 {
        let mut block = vec![input; 4096];
        comp.process_block(&mut block);
        block[block.len() - 1]
    }

    #[test]
    fn linear_below_threshold() {
        // sustain .5 → threshold .6, level .5 → makeup 2.5
        let mut comp = Compressor::new(Arc::new(CompressorParams::default()));
        let quiet = settle(&mut comp, 0.1);
        comp.reset();
        let louder = settle(&mut comp, 0.2);

        assert!((quiet - 0.25).abs() < 1e-5, "got {quiet}");
        assert!((louder - 0.5).abs() < 1e-5, "got {louder}");
    }

    #[test]
    fn sub_linear_above_threshold() {
        let params = Arc::new(CompressorParams::default());
        params.sustain.set(1.0); // threshold 0.2
        params.level.set(0.0); // makeup 1.0
        let mut comp = Compressor::new(params);

        let out_half = settle(&mut comp, 0.5);
        comp.reset();
        let out_full = settle(&mut comp, 1.0);

        // Input doubles; output barely moves.
        assert!(out_half < 0.5 && out_full < 1.0);
        assert!(
            out_full / out_half < 1.1,
            "gain reduction should engage: {out_half} -> {out_full}"
        );
        assert!(comp.envelope() > 0.2);
    }

    #[test]
    fn hard_limits_output() {
        let params = Arc::new(CompressorParams::default());
        params.level.set(1.0);
        params.sustain.set(0.0);
        let mut comp = Compressor::new(params);

        let mut block = vec![0.9, -0.9, 0.9, -0.9];
        comp.process_block(&mut block);
        for s in block {
            assert!(s.abs() <= CEILING);
        }
    }

    #[test]
    fn attack_follows_knob() {
        let fast = Arc::new(CompressorParams::default());
        fast.attack.set(1.0);
        let slow = Arc::new(CompressorParams::default());
        slow.attack.set(0.0);

        let mut a = Compressor::new(fast);
        let mut b = Compressor::new(slow);
        let mut block_a = vec![1.0; 16];
        let mut block_b = vec![1.0; 16];
        a.process_block(&mut block_a);
        b.process_block(&mut block_b);
        assert!(a.envelope() > b.envelope());
    }

    #[test]
    fn envelope_persists_across_blocks() {
        let mut comp = Compressor::new(Arc::new(CompressorParams::default()));
        let mut block = vec![0.8; 64];
        comp.process_block(&mut block);
        let after_first = comp.envelope();
        let mut block = vec![0.8; 64];
        comp.process_block(&mut block);
        assert!(comp.envelope() > after_first);
    }
}
