//! Reverb effect: three parallel feedback comb filters.
//!
//! Comb periods of roughly 29, 37 and 43 ms (plus a 10-sample pad) keep the
//! echo patterns from lining up. `time` sets the comb feedback, `level` the wet mix.

use std::sync::Arc;

use super::ring_buffer::RingBuffer;

/// Comb delays in seconds.
const COMB_DELAYS: [f64; 3] = [0.029, 0.037, 0.043];
/// Extra cells added to each comb.
const COMB_PAD: usize = 10;
const WET_SCALE: f32 = 0.3;

crate::param_table! {
    pub struct ReverbParams {
        time: 0.4,
        level: 0.4,
    }
}

/// A comb filter delay line with feedback.
#[derive(Debug, Clone)]
struct CombFilter {
    line: RingBuffer<f32>,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            line: RingBuffer::new(size),
        }
    }

    fn size_for(sample_rate: f64, delay: f64) -> usize {
        (sample_rate * delay) as usize + COMB_PAD
    }

    /// Return the oldest cell and replace it with `input + oldest * decay`.
    #[inline]
    fn process(&mut self, input: f32, decay: f32) -> f32 {
        let output = self.line.current();
        self.line.write_current(input + output * decay);
        self.line.advance();
        output
    }

    fn len(&self) -> usize {
        self.line.capacity()
    }
}

#[derive(Debug)]
pub struct Reverb {
    params: Arc<ReverbParams>,
    combs: [CombFilter; 3],
}

impl Reverb {
    pub fn new(sample_rate: f64, params: Arc<ReverbParams>) -> Self {
        Self {
            params,
            combs: Self::build_combs(sample_rate),
        }
    }

    fn build_combs(sample_rate: f64) -> [CombFilter; 3] {
        COMB_DELAYS.map(|d| CombFilter::new(CombFilter::size_for(sample_rate, d)))
    }

    pub fn params(&self) -> &Arc<ReverbParams> {
        &self.params
    }

    /// Comb buffer lengths in samples.
    pub fn comb_lengths(&self) -> [usize; 3] {
        [self.combs[0].len(), self.combs[1].len(), self.combs[2].len()]
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let decay = 0.5 + self.params.time.get() * 0.45;
        let wet_gain = self.params.level.get() * WET_SCALE;

        for sample in block.iter_mut() {
            let dry = *sample;
            let wet: f32 = self.combs.iter_mut().map(|c| c.process(dry, decay)).sum();
            *sample = dry + wet * wet_gain;
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.combs = Self::build_combs(sample_rate);
    }

    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.line.clear();
        }
    }
}
