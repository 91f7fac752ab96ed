//! Fuzz: biased, heavily amplified hard clipping.

use std::sync::Arc;

const BIAS: f32 = 0.1;
const CLIP: f32 = 0.9;

crate::param_table! {
    pub struct FuzzParams {
        fuzz: 0.5,
        level: 0.5,
    }
}

#[derive(Debug)]
pub struct Fuzz {
    params: Arc<FuzzParams>,
}

impl Fuzz {
    pub fn new(params: Arc<FuzzParams>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Arc<FuzzParams> {
        &self.params
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let gain = 5.0 + self.params.fuzz.get() * 50.0;
        let out_gain = self.params.level.get() * 0.5;
        for sample in block.iter_mut() {
            *sample = ((*sample + BIAS) * gain).clamp(-CLIP, CLIP) * out_gain;
        }
    }
}
