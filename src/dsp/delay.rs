//! Delay effect: analog-style feedback echo.
//!
//! The delay line holds two seconds at the current sample rate. Repeats pass
//! through a one-pole low-pass and a `tanh` stage before re-entering the line,
//! so each echo comes back darker and slightly saturated.

use std::sync::Arc;

use super::filter::OnePole;
use super::ring_buffer::RingBuffer;

/// Delay line capacity in seconds.
pub const MAX_DELAY_SECONDS: f64 = 2.0;
const DAMPING_COEF: f32 = 0.3;

crate::param_table! {
    pub struct DelayParams {
        time: 0.3,
        repeat: 0.4,
        intensity: 0.5,
    }
}

#[derive(Debug)]
pub struct Delay {
    params: Arc<DelayParams>,
    buffer: RingBuffer<f32>,
    damping: OnePole,
    sample_rate: f64,
}

impl Delay {
    pub fn new(sample_rate: f64, params: Arc<DelayParams>) -> Self {
        Self {
            params,
            buffer: RingBuffer::new(Self::capacity_for(sample_rate)),
            damping: OnePole::new(DAMPING_COEF),
            sample_rate,
        }
    }

    fn capacity_for(sample_rate: f64) -> usize {
        (sample_rate * MAX_DELAY_SECONDS) as usize
    }

    pub fn params(&self) -> &Arc<DelayParams> {
        &self.params
    }

    /// Echo spacing in samples for a time knob position: 20 ms to 620 ms.
    pub fn delay_samples(&self, time: f32) -> usize {
        (0.02 * self.sample_rate + time as f64 * 0.6 * self.sample_rate) as usize
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let delay = self.delay_samples(self.params.time.get());
        let feedback = self.params.repeat.get() * 0.9;
        let mix = self.params.intensity.get();

        for sample in block.iter_mut() {
            let delayed = self.buffer.read_behind(delay);
            let filtered = self.damping.process(delayed);

            let dry = *sample;
            self.buffer.write_current((dry + filtered * feedback).tanh());
            self.buffer.advance();
            *sample = dry + filtered * mix;
        }
    }

    /// Reallocate the line for a new rate. Pending echoes are discarded.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.buffer.resize(Self::capacity_for(sample_rate));
        self.damping.reset();
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.damping.reset();
    }
}
