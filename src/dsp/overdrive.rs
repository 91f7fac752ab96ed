//! Overdrive: asymmetric tanh soft clipping.

use std::sync::Arc;

crate::param_table! {
    pub struct OverdriveParams {
        drive: 0.5,
        level: 0.5,
    }
}

/// Soft-clipping overdrive. Negative half-waves see 70% of the drive,
/// which adds even harmonics.
#[derive(Debug)]
pub struct Overdrive {
    params: Arc<OverdriveParams>,
}

impl Overdrive {
    pub fn new(params: Arc<OverdriveParams>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Arc<OverdriveParams> {
        &self.params
    }

    #[inline]
    fn shape(x: f32, drive: f32) -> f32 {
        if x > 0.0 {
            (x * drive).tanh()
        } else {
            (x * drive * 0.7).tanh()
        }
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let drive = 1.0 + self.params.drive.get() * 20.0;
        let level = self.params.level.get();
        for sample in block.iter_mut() {
            *sample = Self::shape(*sample, drive) * level;
        }
    }
}
