//! Tuner: non-destructive pitch detection for the first pedal in the chain.
//!
//! Keeps a rolling window of the most recent 8192 mono samples. On request the
//! window is Hann-weighted, transformed with a real FFT, and the strongest bin is
//! refined with parabolic interpolation. The estimate is converted to the nearest
//! chromatic note plus a cents deviation.
//!
//! The pedal never alters the signal; it only listens.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;

use super::ring_buffer::RingBuffer;
use crate::error::EffectError;

/// Analysis window length in samples.
pub const TUNER_WINDOW: usize = 8192;

/// Peaks weaker than this (raw FFT magnitude) are treated as silence.
const MIN_PEAK_MAGNITUDE: f64 = 0.1;

/// Guitar-relevant band; estimates outside it are discarded.
const MIN_FREQUENCY: f64 = 60.0;
const MAX_FREQUENCY: f64 = 1500.0;

const A4_FREQUENCY: f64 = 440.0;

/// Chromatic pitch classes starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

crate::param_table! {
    /// The tuner has no knobs; it only follows the pedal's on/off switch.
    pub struct TunerParams {}
}

/// A note name plus deviation in cents, as shown on the tuner display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TunerReading {
    pub note: &'static str,
    pub cents: i32,
}

impl TunerReading {
    /// Display placeholder for "no stable pitch".
    pub const NO_PITCH: TunerReading = TunerReading {
        note: "--",
        cents: 0,
    };

    /// Build a reading from a frequency in Hz.
    pub fn from_frequency(freq: f64) -> Option<TunerReading> {
        if freq <= 0.0 || !freq.is_finite() {
            return None;
        }
        let (midi, cents) = freq_to_midi_cents(freq, A4_FREQUENCY);
        Some(TunerReading {
            note: NOTE_NAMES[midi.rem_euclid(12) as usize],
            // Truncate toward zero, matching the display's integer cents.
            cents: cents as i32,
        })
    }

    pub fn is_pitched(&self) -> bool {
        self.note != Self::NO_PITCH.note
    }
}

/// Convert a frequency to the nearest MIDI note + fine-tune cents.
pub fn freq_to_midi_cents(freq: f64, a4_freq: f64) -> (i32, f64) {
    if freq <= 0.0 {
        return (0, 0.0);
    }
    let midi_float = 69.0 + 12.0 * (freq / a4_freq).log2();
    let midi_note = midi_float.round() as i32;
    let cents = (midi_float - midi_note as f64) * 100.0;
    (midi_note, cents)
}

/// Windowed-FFT pitch estimator over a rolling sample window.
///
/// Every buffer is allocated up front, so `analyze` has a fixed cost and
/// never touches the allocator.
pub struct TunerAnalyzer {
    window: RingBuffer<f32>,
    hann: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    sample_rate: f64,
    primed: bool,
}

impl std::fmt::Debug for TunerAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunerAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}

impl TunerAnalyzer {
    pub fn new(sample_rate: f64) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(TUNER_WINDOW);
        let frame = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            window: RingBuffer::new(TUNER_WINDOW),
            hann: hann_window(TUNER_WINDOW),
            fft,
            frame,
            spectrum,
            scratch,
            sample_rate,
            primed: false,
        }
    }

    /// Append a block to the rolling window, discarding the oldest samples.
    pub fn feed(&mut self, block: &[f32]) {
        for &s in block {
            self.window.push(s);
        }
        if !block.is_empty() {
            self.primed = true;
        }
    }

    /// Estimate the fundamental of the current window.
    ///
    /// Returns `Ok(None)` for silence, weak peaks, or out-of-band estimates.
    pub fn estimate_frequency(&mut self) -> Result<Option<f64>, EffectError> {
        if !self.primed {
            return Ok(None);
        }

        self.window.copy_chronological(&mut self.frame);
        for (s, w) in self.frame.iter_mut().zip(&self.hann) {
            *s *= *w;
        }
        self.fft
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| EffectError::Analysis(e.to_string()))?;

        // First maximum wins on ties.
        let mut peak_idx = 0;
        let mut peak_mag = 0.0f64;
        for (i, c) in self.spectrum.iter().enumerate() {
            let m = c.norm() as f64;
            if m > peak_mag {
                peak_mag = m;
                peak_idx = i;
            }
        }

        if peak_mag < MIN_PEAK_MAGNITUDE {
            return Ok(None);
        }

        let true_idx = if peak_idx > 0 && peak_idx < self.spectrum.len() - 1 {
            let y0 = self.spectrum[peak_idx - 1].norm() as f64;
            let y1 = peak_mag;
            let y2 = self.spectrum[peak_idx + 1].norm() as f64;
            let denom = y0 - 2.0 * y1 + y2;
            if denom != 0.0 {
                peak_idx as f64 + 0.5 * (y0 - y2) / denom
            } else {
                peak_idx as f64
            }
        } else {
            peak_idx as f64
        };

        let freq = true_idx * self.sample_rate / TUNER_WINDOW as f64;
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&freq) {
            return Ok(None);
        }
        Ok(Some(freq))
    }

    /// Note + cents for the current window, or `None` when no pitch is found.
    pub fn analyze(&mut self) -> Result<Option<TunerReading>, EffectError> {
        Ok(self
            .estimate_frequency()?
            .and_then(TunerReading::from_frequency))
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.primed = false;
    }
}

/// Symmetric Hann window (`0.5 - 0.5 cos(2πn / (N-1))`).
fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| (0.5 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / denom).cos()) as f32)
        .collect()
}

/// The tuner pedal: true bypass plus a pitch analyzer.
#[derive(Debug)]
pub struct Tuner {
    params: Arc<TunerParams>,
    analyzer: TunerAnalyzer,
}

impl Tuner {
    pub fn new(sample_rate: f64, params: Arc<TunerParams>) -> Self {
        Self {
            params,
            analyzer: TunerAnalyzer::new(sample_rate),
        }
    }

    pub fn params(&self) -> &Arc<TunerParams> {
        &self.params
    }

    /// Record the block for analysis. The samples are left untouched.
    pub fn process_block(&mut self, block: &mut [f32]) {
        self.analyzer.feed(block);
    }

    /// Current reading of the rolling window.
    pub fn reading(&mut self) -> Result<Option<TunerReading>, EffectError> {
        self.analyzer.analyze()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.analyzer.set_sample_rate(sample_rate);
    }

    pub fn reset(&mut self) {
        self.analyzer.reset();
    }
}
