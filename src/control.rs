//! Control surface: the thread-safe write/read API used by request handlers.
//!
//! Every write lands in an atomic shared with the audio thread, so callers never
//! lock anything the callback needs. Writes addressed to an unknown pedal or
//! knob, or carrying a non-finite value, are ignored: they return `false` and
//! are logged at debug level.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsp::amp::AmpControls;
use crate::dsp::effect::PedalControls;
use crate::dsp::engine::AudioEngine;
use crate::dsp::param::{AtomicF32, ParamTable};

/// Input gain range accepted by [`ParameterStore::set_gain`].
pub const MAX_INPUT_GAIN: f32 = 10.0;

/// One pedal's switch and knobs, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedalSnapshot {
    pub active: bool,
    pub params: BTreeMap<String, f32>,
}

/// Full pedalboard state keyed by pedal name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot(pub BTreeMap<String, PedalSnapshot>);

impl StateSnapshot {
    pub fn get(&self, name: &str) -> Option<&PedalSnapshot> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Input gain plus the amp's front panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmpSnapshot {
    pub gain: f32,
    pub controls: BTreeMap<String, f32>,
}

/// Cloneable handle to every control the audio thread reads.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    pedals: Arc<[(String, Arc<PedalControls>)]>,
    amp: Arc<AmpControls>,
    gain: Arc<AtomicF32>,
}

impl ParameterStore {
    /// Collect the shared controls of an engine.
    pub fn new(engine: &AudioEngine) -> Self {
        Self {
            pedals: engine.chain().controls().into(),
            amp: engine.amp_controls(),
            gain: engine.gain_handle(),
        }
    }

    fn pedal(&self, name: &str) -> Option<&Arc<PedalControls>> {
        self.pedals.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Pedal names in chain order.
    pub fn effect_names(&self) -> impl Iterator<Item = &str> {
        self.pedals.iter().map(|(n, _)| n.as_str())
    }

    /// Set the input gain. Clamped to `[0, 10]`; non-finite values are ignored.
    pub fn set_gain(&self, value: f32) -> bool {
        if !value.is_finite() {
            log::debug!("set_gain: ignoring non-finite value {}", value);
            return false;
        }
        self.gain.set(value.clamp(0.0, MAX_INPUT_GAIN));
        true
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    /// Switch a pedal on or off. Unknown names are ignored.
    pub fn set_effect_active(&self, name: &str, active: bool) -> bool {
        match self.pedal(name) {
            Some(controls) => {
                controls.set_active(active);
                true
            }
            None => {
                log::debug!("set_effect_active: unknown effect '{}'", name);
                false
            }
        }
    }

    /// Turn a pedal knob. Unknown pedals or knobs and non-finite values are ignored;
    /// everything else is clamped to `[0, 1]`.
    pub fn set_effect_parameter(&self, name: &str, param: &str, value: f32) -> bool {
        let Some(controls) = self.pedal(name) else {
            log::debug!("set_effect_parameter: unknown effect '{}'", name);
            return false;
        };
        let accepted = controls.params().set(param, value);
        if !accepted {
            log::debug!(
                "set_effect_parameter: rejected {}.{} = {}",
                name,
                param,
                value
            );
        }
        accepted
    }

    /// Turn an amp knob (`master`, `bass`, `middle`, `treble`, `preamp`, `presence`).
    pub fn set_amp_control(&self, name: &str, value: f32) -> bool {
        let accepted = self.amp.set(name, value);
        if !accepted {
            log::debug!("set_amp_control: rejected {} = {}", name, value);
        }
        accepted
    }

    pub fn effect_active(&self, name: &str) -> Option<bool> {
        self.pedal(name).map(|c| c.is_active())
    }

    pub fn effect_parameter(&self, name: &str, param: &str) -> Option<f32> {
        self.pedal(name).and_then(|c| c.params().get(param))
    }

    /// Blocks in which this pedal produced unusable output.
    pub fn effect_faults(&self, name: &str) -> Option<u64> {
        self.pedal(name).map(|c| c.faults())
    }

    /// Every pedal's switch and knobs.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot(
            self.pedals
                .iter()
                .map(|(name, c)| {
                    (
                        name.clone(),
                        PedalSnapshot {
                            active: c.is_active(),
                            params: c.params().values(),
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn amp_snapshot(&self) -> AmpSnapshot {
        AmpSnapshot {
            gain: self.gain(),
            controls: self.amp.values(),
        }
    }
}
