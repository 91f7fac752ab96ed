//! Chorus effect: LFO-modulated delay for thickening sound.
//!
//! The delayed copy sweeps around a 400-sample base offset and is darkened by
//! a fixed 0.8 attenuation before being added to the dry signal. No feedback.

use std::sync::Arc;

use super::oscillator::Lfo;
use super::ring_buffer::RingBuffer;

/// Chorus delay line length in samples.
pub const CHORUS_BUFFER_LEN: usize = 4800;
const BASE_DELAY: f64 = 400.0;
const WET_ATTENUATION: f32 = 0.8;

crate::param_table! {
    pub struct ChorusParams {
        rate: 0.3,
        depth: 0.5,
    }
}

#[derive(Debug)]
pub struct Chorus {
    params: Arc<ChorusParams>,
    buffer: RingBuffer<f32>,
    lfo: Lfo,
}

impl Chorus {
    pub fn new(sample_rate: f64, params: Arc<ChorusParams>) -> Self {
        Self {
            params,
            buffer: RingBuffer::new(CHORUS_BUFFER_LEN),
            lfo: Lfo::new(sample_rate),
        }
    }

    pub fn params(&self) -> &Arc<ChorusParams> {
        &self.params
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let rate = 0.5 + self.params.rate.get() as f64 * 3.0;
        let depth = 50.0 + self.params.depth.get() as f64 * 200.0;
        let inc = self.lfo.phase_inc(rate);

        for sample in block.iter_mut() {
            let delay = BASE_DELAY + self.lfo.next_sample(inc) * depth;
            let read_pos = (self.buffer.cursor() as f64 - delay) as isize;
            let delayed = self.buffer.read(read_pos) * WET_ATTENUATION;

            self.buffer.push(*sample);
            *sample += delayed;
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.lfo.set_sample_rate(sample_rate);
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.lfo.reset();
    }
}
