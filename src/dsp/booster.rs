//! Booster: cubic soft saturation preamp.

use std::sync::Arc;

crate::param_table! {
    pub struct BoosterParams {
        gain: 0.5,
        level: 0.5,
    }
}

#[derive(Debug)]
pub struct Booster {
    params: Arc<BoosterParams>,
}

impl Booster {
    pub fn new(params: Arc<BoosterParams>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Arc<BoosterParams> {
        &self.params
    }

    /// `y = x*d - (x*d)^3 / 3`
    pub fn process_block(&mut self, block: &mut [f32]) {
        let drive = 1.0 + self.params.gain.get() * 5.0;
        let level = self.params.level.get();
        for sample in block.iter_mut() {
            let x = *sample * drive;
            *sample = (x - x * x * x / 3.0) * level;
        }
    }
}
