//! Amplifier simulator: the post-chain preamp, tone and master stage.
//!
//! The tone stack is a broadband gain (`eq_factor`) rather than a set of
//! filters, and the preamp is a single `tanh` stage.

use std::sync::Arc;

/// Master values at or below this are treated as [`MASTER_FALLBACK`].
pub const MASTER_FLOOR: f32 = 0.05;
pub const MASTER_FALLBACK: f32 = 0.5;
/// Output headroom multiplier.
const OUTPUT_SCALE: f32 = 2.0;

crate::param_table! {
    /// Amp front-panel controls. `presence` is reported but not applied.
    pub struct AmpControls {
        master: 0.5,
        bass: 0.5,
        middle: 0.5,
        treble: 0.5,
        preamp: 0.5,
        presence: 0.5,
    }
}

impl AmpControls {
    /// Effective master volume after the safety floor.
    pub fn effective_master(&self) -> f32 {
        let master = self.master.get();
        if master <= MASTER_FLOOR {
            MASTER_FALLBACK
        } else {
            master
        }
    }

    pub fn eq_factor(&self) -> f32 {
        0.8 + self.bass.get() * 0.2 + self.middle.get() * 0.4 + self.treble.get() * 0.3
    }
}

#[derive(Debug)]
pub struct AmplifierSimulator {
    controls: Arc<AmpControls>,
}

impl AmplifierSimulator {
    pub fn new(controls: Arc<AmpControls>) -> Self {
        Self { controls }
    }

    pub fn controls(&self) -> &Arc<AmpControls> {
        &self.controls
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        let drive = 1.0 + self.controls.preamp.get() * 5.0;
        let out_gain = self.controls.effective_master() * self.controls.eq_factor() * OUTPUT_SCALE;
        for sample in block.iter_mut() {
            *sample = (*sample * drive).tanh() * out_gain;
        }
    }
}
