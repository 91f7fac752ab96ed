//! Pitch shifter: variable-speed playback from a circular buffer.
//!
//! Input is written at unit rate while a fractional read cursor walks the same
//! buffer at `0.5 + pitch` samples per sample, giving roughly half to one and
//! a half times the original pitch. Reads are linearly interpolated.

use std::sync::Arc;

use super::ring_buffer::RingBuffer;

/// Shift buffer length in samples.
pub const SHIFT_BUFFER_LEN: usize = 8000;

crate::param_table! {
    pub struct PitchShifterParams {
        pitch: 0.5,
        balance: 0.5,
    }
}

#[derive(Debug)]
pub struct PitchShifter {
    params: Arc<PitchShifterParams>,
    buffer: RingBuffer<f32>,
    read_pos: f64,
}

impl PitchShifter {
    pub fn new(params: Arc<PitchShifterParams>) -> Self {
        Self {
            params,
            buffer: RingBuffer::new(SHIFT_BUFFER_LEN),
            read_pos: 0.0,
        }
    }

    pub fn params(&self) -> &Arc<PitchShifterParams> {
        &self.params
    }

    /// Linear interpolation between the two cells around `pos`.
    #[inline]
    fn read_interpolated(&self, pos: f64) -> f32 {
        let idx = pos.floor();
        let frac = (pos - idx) as f32;
        let idx = idx as isize;
        let s1 = self.buffer.read(idx);
        let s2 = self.buffer.read(idx + 1);
        s1 * (1.0 - frac) + s2 * frac
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let shift = 0.5 + self.params.pitch.get() as f64;
        let mix = self.params.balance.get();
        let len = self.buffer.capacity() as f64;

        for sample in block.iter_mut() {
            self.buffer.write_current(*sample);
            let shifted = self.read_interpolated(self.read_pos);
            *sample = *sample * (1.0 - mix) + shifted * mix;

            self.buffer.advance();
            self.read_pos += shift;
            if self.read_pos >= len {
                self.read_pos -= len;
            }
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.read_pos = 0.0;
    }
}
