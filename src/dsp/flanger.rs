//! Flanger: short LFO-swept delay with resonance feedback.

use std::sync::Arc;

use super::oscillator::Lfo;
use super::ring_buffer::RingBuffer;

/// Flanger delay line length in samples.
pub const FLANGER_BUFFER_LEN: usize = 4000;
/// Minimum sweep delay in samples.
const BASE_DELAY: f64 = 20.0;
/// Overall output trim.
const OUTPUT_TRIM: f32 = 0.7;

crate::param_table! {
    pub struct FlangerParams {
        rate: 0.4,
        depth: 0.6,
        res: 0.5,
    }
}

#[derive(Debug)]
pub struct Flanger {
    params: Arc<FlangerParams>,
    buffer: RingBuffer<f32>,
    lfo: Lfo,
}

impl Flanger {
    pub fn new(sample_rate: f64, params: Arc<FlangerParams>) -> Self {
        Self {
            params,
            buffer: RingBuffer::new(FLANGER_BUFFER_LEN),
            lfo: Lfo::new(sample_rate),
        }
    }

    pub fn params(&self) -> &Arc<FlangerParams> {
        &self.params
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let rate = 0.1 + self.params.rate.get() as f64 * 4.0;
        let depth = self.params.depth.get() as f64 * 100.0;
        let feedback = self.params.res.get() * 0.8;
        let inc = self.lfo.phase_inc(rate);

        for sample in block.iter_mut() {
            // Unipolar sweep in [0, 1].
            let sweep = (1.0 + self.lfo.next_sample(inc)) * 0.5;
            let delay = BASE_DELAY + sweep * depth;
            let read_pos = (self.buffer.cursor() as f64 - delay) as isize;
            let delayed = self.buffer.read(read_pos);

            let dry = *sample;
            self.buffer.write_current(dry + delayed * feedback);
            self.buffer.advance();
            *sample = (dry + delayed) * OUTPUT_TRIM;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_silence_out() {
        let mut fl = Flanger::new(44100.0, Arc::new(FlangerParams::default()));
        let mut block = vec![0.0; 1024];
        fl.process_block(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn impulse_repeats_with_resonance() {
        let params = Arc::new(FlangerParams::default());
        params.depth.set(0.0); // fixed 20-sample delay
        params.res.set(0.5); // feedback 0.4
        let mut fl = Flanger::new(44100.0, params);

        let mut block = vec![0.0; 64];
        block[0] = 1.0;
        fl.process_block(&mut block);

        assert!((block[0] - 0.7).abs() < 1e-6);
        assert_eq!(block[10], 0.0);
        assert!((block[20] - 0.7).abs() < 1e-6);
        assert!((block[40] - 0.28).abs() < 1e-6);
    }

    #[test]
    fn sweep_stays_bounded() {
        let params = Arc::new(FlangerParams::default());
        params.res.set(1.0);
        params.depth.set(1.0);
        let mut fl = Flanger::new(44100.0, params);
        for _ in 0..20 {
            let mut block: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
            fl.process_block(&mut block);
            assert!(block.iter().all(|s| s.is_finite() && s.abs() < 10.0));
        }
    }
}
