//! Effect chain: the fixed-order row of pedals between the input and the amp.
//!
//! Order and membership are fixed when the chain is built; only the pedals'
//! switches and knobs change afterwards.

use std::sync::Arc;

use super::effect::{EffectKind, Pedal, PedalControls};
use super::tuner::TunerReading;
use crate::config::PedalSpec;
use crate::error::EffectError;

#[derive(Debug)]
pub struct EffectChain {
    pedals: Vec<Pedal>,
    /// Work buffer handed to each pedal; sized once for the largest block.
    scratch: Vec<f32>,
}

impl EffectChain {
    pub fn new(specs: &[PedalSpec], sample_rate: f64, max_block_frames: usize) -> Self {
        let pedals = specs
            .iter()
            .map(|spec| Pedal::new(spec.name.clone(), spec.kind, sample_rate))
            .collect();
        Self {
            pedals,
            scratch: vec![0.0; max_block_frames.max(1)],
        }
    }

    /// Largest block `process` accepts in one call.
    pub fn max_block_frames(&self) -> usize {
        self.scratch.len()
    }

    /// Run every pedal in order.
    ///
    /// A pedal that fails leaves the signal as it was before that stage and the
    /// rest of the chain still runs. Blocks longer than
    /// [`Self::max_block_frames`] are processed in chunks.
    pub fn process(&mut self, block: &mut [f32]) {
        let max = self.scratch.len();
        for chunk in block.chunks_mut(max) {
            for pedal in &mut self.pedals {
                if let Err(e) = pedal.process(chunk, &mut self.scratch) {
                    log::warn!("Pedal '{}' bypassed for one block: {}", pedal.key(), e);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pedals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pedals.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pedals.iter().map(Pedal::key)
    }

    pub fn pedal(&self, key: &str) -> Option<&Pedal> {
        self.pedals.iter().find(|p| p.key() == key)
    }

    /// Shared controls for every pedal, in chain order.
    pub fn controls(&self) -> Vec<(String, Arc<PedalControls>)> {
        self.pedals
            .iter()
            .map(|p| (p.key().to_string(), p.controls().clone()))
            .collect()
    }

    /// The first tuner on the board, if any.
    fn tuner_mut(&mut self) -> Option<&mut Pedal> {
        self.pedals.iter_mut().find(|p| p.kind() == EffectKind::Tuner)
    }

    /// Whether the board has a tuner and it is switched on.
    pub fn tuner_active(&self) -> bool {
        self.pedals
            .iter()
            .find(|p| p.kind() == EffectKind::Tuner)
            .is_some_and(|p| p.controls().is_active())
    }

    /// Analyze the tuner's window. `None` when there is no tuner or no pitch.
    pub fn tuner_reading(&mut self) -> Result<Option<TunerReading>, EffectError> {
        match self.tuner_mut().and_then(Pedal::tuner_reading) {
            Some(reading) => reading,
            None => Ok(None),
        }
    }

    /// Rescale every pedal's time-based buffers.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        for pedal in &mut self.pedals {
            pedal.set_sample_rate(sample_rate);
        }
    }

    pub fn reset(&mut self) {
        for pedal in &mut self.pedals {
            pedal.reset();
        }
    }
}
