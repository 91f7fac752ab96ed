//! Distortion: hard clipping followed by a one-pole "scoop" tone control.

use std::sync::Arc;

use super::filter::OnePole;

const CLIP: f32 = 0.8;
const TONE_SPLIT_COEF: f32 = 0.1;

crate::param_table! {
    pub struct DistortionParams {
        dist: 0.5,
        tone: 0.5,
        level: 0.5,
    }
}

/// Hard-clip distortion with a low/high tone blend.
///
/// A one-pole low-pass splits the clipped signal into a low band and its
/// complement; `tone` crossfades between the two.
#[derive(Debug)]
pub struct Distortion {
    params: Arc<DistortionParams>,
    low: OnePole,
}

impl Distortion {
    pub fn new(params: Arc<DistortionParams>) -> Self {
        Self {
            params,
            low: OnePole::new(TONE_SPLIT_COEF),
        }
    }

    pub fn params(&self) -> &Arc<DistortionParams> {
        &self.params
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let drive = 1.0 + self.params.dist.get() * 30.0;
        let tone = self.params.tone.get();
        let out_gain = self.params.level.get() * 2.0;

        for sample in block.iter_mut() {
            let clipped = (*sample * drive).clamp(-CLIP, CLIP);
            let low = self.low.process(clipped);
            let high = clipped - low;
            *sample = (low * (1.0 - tone) + high * tone) * out_gain;
        }
    }

    pub fn reset(&mut self) {
        self.low.reset();
    }
}
