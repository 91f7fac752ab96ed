//! Pedals: the effect variants and the slot that holds one in the chain.
//!
//! Each pedal is split in two:
//!
//! - [`PedalControls`]: the on/off switch and knob table, shared with the
//!   control thread behind an `Arc` and only ever touched through atomics.
//! - [`Effect`]: the DSP state (delay lines, envelopes, LFO phases), owned and
//!   mutated exclusively by the audio thread.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::booster::{Booster, BoosterParams};
use super::chorus::{Chorus, ChorusParams};
use super::compressor::{Compressor, CompressorParams};
use super::delay::{Delay, DelayParams};
use super::distortion::{Distortion, DistortionParams};
use super::flanger::{Flanger, FlangerParams};
use super::fuzz::{Fuzz, FuzzParams};
use super::overdrive::{Overdrive, OverdriveParams};
use super::param::ParamTable;
use super::pitch_shifter::{PitchShifter, PitchShifterParams};
use super::reverb::{Reverb, ReverbParams};
use super::tuner::{Tuner, TunerParams, TunerReading};
use crate::error::EffectError;

/// The available pedal models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Tuner,
    Compressor,
    PitchShifter,
    Distortion,
    Overdrive,
    Fuzz,
    Booster,
    Flanger,
    Chorus,
    Delay,
    Reverb,
}

impl EffectKind {
    /// Every kind, in standard pedalboard order.
    pub const ALL: [EffectKind; 11] = [
        EffectKind::Tuner,
        EffectKind::Compressor,
        EffectKind::PitchShifter,
        EffectKind::Distortion,
        EffectKind::Overdrive,
        EffectKind::Fuzz,
        EffectKind::Booster,
        EffectKind::Flanger,
        EffectKind::Chorus,
        EffectKind::Delay,
        EffectKind::Reverb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Tuner => "tuner",
            EffectKind::Compressor => "compressor",
            EffectKind::PitchShifter => "pitch_shifter",
            EffectKind::Distortion => "distortion",
            EffectKind::Overdrive => "overdrive",
            EffectKind::Fuzz => "fuzz",
            EffectKind::Booster => "booster",
            EffectKind::Flanger => "flanger",
            EffectKind::Chorus => "chorus",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }

    /// Key this kind is addressed by on the standard board.
    pub fn default_key(self) -> &'static str {
        match self {
            EffectKind::Tuner => "tuner",
            EffectKind::Compressor => "comp",
            EffectKind::PitchShifter => "pitch",
            EffectKind::Distortion => "dist",
            EffectKind::Overdrive => "drive",
            EffectKind::Fuzz => "fuzz",
            EffectKind::Booster => "boost",
            EffectKind::Flanger => "flanger",
            EffectKind::Chorus => "chorus",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// DSP state for one pedal, tagged by model.
#[derive(Debug)]
pub enum Effect {
    Tuner(Tuner),
    Compressor(Compressor),
    PitchShifter(PitchShifter),
    Distortion(Distortion),
    Overdrive(Overdrive),
    Fuzz(Fuzz),
    Booster(Booster),
    Flanger(Flanger),
    Chorus(Chorus),
    Delay(Delay),
    Reverb(Reverb),
}

impl Effect {
    /// Build an effect with default knobs. Returns the DSP state and its shared knob table.
    pub fn new(kind: EffectKind, sample_rate: f64) -> (Effect, Arc<dyn ParamTable>) {
        fn shared<P: ParamTable + Default + 'static>() -> (Arc<P>, Arc<dyn ParamTable>) {
            let p = Arc::new(P::default());
            let table: Arc<dyn ParamTable> = p.clone();
            (p, table)
        }

        match kind {
            EffectKind::Tuner => {
                let (p, t) = shared::<TunerParams>();
                (Effect::Tuner(Tuner::new(sample_rate, p)), t)
            }
            EffectKind::Compressor => {
                let (p, t) = shared::<CompressorParams>();
                (Effect::Compressor(Compressor::new(p)), t)
            }
            EffectKind::PitchShifter => {
                let (p, t) = shared::<PitchShifterParams>();
                (Effect::PitchShifter(PitchShifter::new(p)), t)
            }
            EffectKind::Distortion => {
                let (p, t) = shared::<DistortionParams>();
                (Effect::Distortion(Distortion::new(p)), t)
            }
            EffectKind::Overdrive => {
                let (p, t) = shared::<OverdriveParams>();
                (Effect::Overdrive(Overdrive::new(p)), t)
            }
            EffectKind::Fuzz => {
                let (p, t) = shared::<FuzzParams>();
                (Effect::Fuzz(Fuzz::new(p)), t)
            }
            EffectKind::Booster => {
                let (p, t) = shared::<BoosterParams>();
                (Effect::Booster(Booster::new(p)), t)
            }
            EffectKind::Flanger => {
                let (p, t) = shared::<FlangerParams>();
                (Effect::Flanger(Flanger::new(sample_rate, p)), t)
            }
            EffectKind::Chorus => {
                let (p, t) = shared::<ChorusParams>();
                (Effect::Chorus(Chorus::new(sample_rate, p)), t)
            }
            EffectKind::Delay => {
                let (p, t) = shared::<DelayParams>();
                (Effect::Delay(Delay::new(sample_rate, p)), t)
            }
            EffectKind::Reverb => {
                let (p, t) = shared::<ReverbParams>();
                (Effect::Reverb(Reverb::new(sample_rate, p)), t)
            }
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Tuner(_) => EffectKind::Tuner,
            Effect::Compressor(_) => EffectKind::Compressor,
            Effect::PitchShifter(_) => EffectKind::PitchShifter,
            Effect::Distortion(_) => EffectKind::Distortion,
            Effect::Overdrive(_) => EffectKind::Overdrive,
            Effect::Fuzz(_) => EffectKind::Fuzz,
            Effect::Booster(_) => EffectKind::Booster,
            Effect::Flanger(_) => EffectKind::Flanger,
            Effect::Chorus(_) => EffectKind::Chorus,
            Effect::Delay(_) => EffectKind::Delay,
            Effect::Reverb(_) => EffectKind::Reverb,
        }
    }

    /// Run the DSP in place, regardless of the on/off switch.
    pub fn process_block(&mut self, block: &mut [f32]) {
        match self {
            Effect::Tuner(e) => e.process_block(block),
            Effect::Compressor(e) => e.process_block(block),
            Effect::PitchShifter(e) => e.process_block(block),
            Effect::Distortion(e) => e.process_block(block),
            Effect::Overdrive(e) => e.process_block(block),
            Effect::Fuzz(e) => e.process_block(block),
            Effect::Booster(e) => e.process_block(block),
            Effect::Flanger(e) => e.process_block(block),
            Effect::Chorus(e) => e.process_block(block),
            Effect::Delay(e) => e.process_block(block),
            Effect::Reverb(e) => e.process_block(block),
        }
    }

    /// Rescale time-based state for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        match self {
            Effect::Tuner(e) => e.set_sample_rate(sample_rate),
            Effect::Flanger(e) => e.set_sample_rate(sample_rate),
            Effect::Chorus(e) => e.set_sample_rate(sample_rate),
            Effect::Delay(e) => e.set_sample_rate(sample_rate),
            Effect::Reverb(e) => e.set_sample_rate(sample_rate),
            // Sample-rate independent.
            Effect::Compressor(_)
            | Effect::PitchShifter(_)
            | Effect::Distortion(_)
            | Effect::Overdrive(_)
            | Effect::Fuzz(_)
            | Effect::Booster(_) => {}
        }
    }

    /// Clear all DSP memory.
    pub fn reset(&mut self) {
        match self {
            Effect::Tuner(e) => e.reset(),
            Effect::Compressor(e) => e.reset(),
            Effect::PitchShifter(e) => e.reset(),
            Effect::Distortion(e) => e.reset(),
            Effect::Flanger(e) => e.reset(),
            Effect::Chorus(e) => e.reset(),
            Effect::Delay(e) => e.reset(),
            Effect::Reverb(e) => e.reset(),
            Effect::Overdrive(_) | Effect::Fuzz(_) | Effect::Booster(_) => {}
        }
    }
}

/// The thread-shared half of a pedal: switch, knobs and a fault counter.
#[derive(Debug)]
pub struct PedalControls {
    kind: EffectKind,
    active: AtomicBool,
    params: Arc<dyn ParamTable>,
    faults: AtomicU64,
}

impl PedalControls {
    fn new(kind: EffectKind, params: Arc<dyn ParamTable>) -> Self {
        Self {
            kind,
            active: AtomicBool::new(false),
            params,
            faults: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn params(&self) -> &dyn ParamTable {
        self.params.as_ref()
    }

    /// Number of blocks this pedal has failed since construction.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }
}

/// One slot on the board: a stable key, shared controls and audio-thread DSP state.
#[derive(Debug)]
pub struct Pedal {
    key: String,
    controls: Arc<PedalControls>,
    effect: Effect,
}

impl Pedal {
    pub fn new(key: impl Into<String>, kind: EffectKind, sample_rate: f64) -> Self {
        let (effect, params) = Effect::new(kind, sample_rate);
        Self {
            key: key.into(),
            controls: Arc::new(PedalControls::new(kind, params)),
            effect,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> EffectKind {
        self.effect.kind()
    }

    pub fn controls(&self) -> &Arc<PedalControls> {
        &self.controls
    }

    /// Process one block in place.
    ///
    /// The DSP always runs, on `scratch`, so its state keeps evolving while the
    /// pedal is switched off. The block is only overwritten when the pedal is on
    /// and the result is finite. `scratch` must be at least `block.len()` long.
    pub fn process(&mut self, block: &mut [f32], scratch: &mut [f32]) -> Result<(), EffectError> {
        let scratch = &mut scratch[..block.len()];
        scratch.copy_from_slice(block);
        self.effect.process_block(scratch);

        if scratch.iter().any(|s| !s.is_finite()) {
            self.effect.reset();
            self.controls.record_fault();
            return Err(EffectError::NonFinite {
                effect: self.kind(),
            });
        }

        if self.controls.is_active() {
            block.copy_from_slice(scratch);
        }
        Ok(())
    }

    /// Current tuner reading, if this pedal is a tuner.
    pub fn tuner_reading(&mut self) -> Option<Result<Option<TunerReading>, EffectError>> {
        match &mut self.effect {
            Effect::Tuner(t) => Some(t.reading()),
            _ => None,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.effect.set_sample_rate(sample_rate);
    }

    pub fn reset(&mut self) {
        self.effect.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44100.0;
                0.6 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                    + 0.2 * (2.0 * std::f32::consts::PI * 1330.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn inactive_pedals_pass_through_exactly() {
        for kind in EffectKind::ALL {
            let mut pedal = Pedal::new(kind.default_key(), kind, 44100.0);
            let mut scratch = vec![0.0; 512];
            for chunk in test_signal(4096).chunks(512) {
                let mut block = chunk.to_vec();
                pedal.process(&mut block, &mut scratch).unwrap();
                assert_eq!(block, chunk, "{kind} altered the signal while off");
            }
        }
    }

    #[test]
    fn active_pedals_transform_except_tuner() {
        for kind in EffectKind::ALL {
            let mut pedal = Pedal::new(kind.default_key(), kind, 44100.0);
            pedal.controls().set_active(true);
            let knobs = pedal.controls().params();
            for name in knobs.names() {
                knobs.set(name, 0.8);
            }
            // Bring the first echo inside the block.
            knobs.set("time", 0.0);

            let input = test_signal(4096);
            let mut output = input.clone();
            let mut scratch = vec![0.0; 4096];
            pedal.process(&mut output, &mut scratch).unwrap();
            if kind == EffectKind::Tuner {
                assert_eq!(output, input);
            } else {
                assert_ne!(output, input, "{kind} did nothing while on");
            }
        }
    }

    #[test]
    fn state_keeps_running_while_bypassed() {
        // Echo trails survive a brief bypass.
        let mut pedal = Pedal::new("delay", EffectKind::Delay, 44100.0);
        pedal.controls().params().set("time", 0.0);
        pedal.controls().set_active(true);
        let mut scratch = vec![0.0; 1024];

        let mut block = vec![0.0; 512];
        block[0] = 1.0;
        pedal.process(&mut block, &mut scratch).unwrap();

        pedal.controls().set_active(false);
        let mut block = vec![0.0; 256];
        pedal.process(&mut block, &mut scratch).unwrap();
        assert!(block.iter().all(|&s| s == 0.0));

        // The echo due at sample 882 arrives on schedule.
        pedal.controls().set_active(true);
        let mut block = vec![0.0; 512];
        pedal.process(&mut block, &mut scratch).unwrap();
        assert!(block[882 - 768] > 0.1);
    }

    #[test]
    fn non_finite_output_is_contained() {
        let mut pedal = Pedal::new("boost", EffectKind::Booster, 44100.0);
        pedal.controls().set_active(true);
        let mut scratch = vec![0.0; 4];
        let mut block = vec![0.1, f32::INFINITY, 0.2, 0.3];
        let before = block.clone();

        let err = pedal.process(&mut block, &mut scratch).unwrap_err();
        assert_eq!(
            err,
            EffectError::NonFinite {
                effect: EffectKind::Booster
            }
        );
        assert_eq!(block[0], before[0]);
        assert_eq!(block[2..], before[2..]);
        assert_eq!(pedal.controls().faults(), 1);
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&EffectKind::PitchShifter).unwrap();
        assert_eq!(json, "\"pitch_shifter\"");
        let kind: EffectKind = serde_json::from_str("\"reverb\"").unwrap();
        assert_eq!(kind, EffectKind::Reverb);
    }

    #[test]
    fn knob_tables_match_models() {
        let (_, table) = Effect::new(EffectKind::Delay, 44100.0);
        assert_eq!(table.names(), &["time", "repeat", "intensity"]);
        let (_, table) = Effect::new(EffectKind::Tuner, 44100.0);
        assert!(table.names().is_empty());
    }
}
