//! Audio Engine: the per-block pipeline run by the audio callback.
//!
//! Each block: mono-reduce the input → input gain → effect chain → amp →
//! duplicate to the output channels. After the block a meter reading (and,
//! every `tuner_interval` blocks, a tuner reading) is pushed into a lock-free
//! notification queue for the control side.
//!
//! Nothing here allocates or blocks once the engine is built: work buffers are
//! sized for `max_block_frames`, larger callbacks are processed in chunks, and a
//! full notification queue simply drops the update.

use std::sync::Arc;

use serde::Serialize;

use super::amp::{AmpControls, AmplifierSimulator};
use super::chain::EffectChain;
use super::param::AtomicF32;
use super::tuner::TunerReading;
use crate::config::EngineConfig;

/// Meter scale applied to the mean absolute output.
const METER_SCALE: f32 = 20.0;

/// Block-cadence update for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineNotification {
    /// Output level: mean absolute sample value × 20.
    pub level: f32,
    /// Present only on tuner blocks while the tuner is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuner: Option<TunerReading>,
}

/// Receiving end of the engine's notification queue.
pub struct NotificationReceiver {
    consumer: rtrb::Consumer<EngineNotification>,
}

impl NotificationReceiver {
    /// Next pending notification, if any. Never blocks.
    pub fn try_recv(&mut self) -> Option<EngineNotification> {
        self.consumer.pop().ok()
    }

    /// Take everything currently queued.
    pub fn drain(&mut self) -> Vec<EngineNotification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// The newest queued notification, discarding older ones.
    pub fn latest(&mut self) -> Option<EngineNotification> {
        std::iter::from_fn(|| self.try_recv()).last()
    }

    /// Whether the engine side has been dropped (stream closed or restarted).
    pub fn is_closed(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

impl std::fmt::Debug for NotificationReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationReceiver")
            .field("pending", &self.consumer.slots())
            .finish()
    }
}

/// The real-time block processor.
#[derive(Debug)]
pub struct AudioEngine {
    chain: EffectChain,
    amp: AmplifierSimulator,
    gain: Arc<AtomicF32>,
    sample_rate: f64,
    tuner_interval: u32,
    tuner_timer: u32,
    /// Mono work buffer, `max_block_frames` long.
    mono: Vec<f32>,
    notifications: Option<rtrb::Producer<EngineNotification>>,
}

impl AudioEngine {
    pub fn new(config: &EngineConfig, sample_rate: f64) -> Self {
        let max_block = config.max_block_frames.max(1);
        Self {
            chain: EffectChain::new(&config.chain, sample_rate, max_block),
            amp: AmplifierSimulator::new(Arc::new(AmpControls::default())),
            gain: Arc::new(AtomicF32::new(config.input_gain)),
            sample_rate,
            tuner_interval: config.tuner_interval.max(1),
            tuner_timer: 0,
            mono: vec![0.0; max_block],
            notifications: None,
        }
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn gain_handle(&self) -> Arc<AtomicF32> {
        self.gain.clone()
    }

    pub fn amp_controls(&self) -> Arc<AmpControls> {
        self.amp.controls().clone()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Rescale all time-based effect buffers. Call only while no stream is running.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.chain.set_sample_rate(sample_rate);
        self.tuner_timer = 0;
    }

    /// Install a fresh notification queue and return its receiving end.
    ///
    /// Any previous receiver sees its queue abandoned.
    pub fn open_notifications(&mut self, capacity: usize) -> NotificationReceiver {
        let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(1));
        self.notifications = Some(producer);
        NotificationReceiver { consumer }
    }

    pub fn close_notifications(&mut self) {
        self.notifications = None;
    }

    /// Process one mono block in place: gain → chain → amp, then notify.
    ///
    /// Blocks longer than `max_block_frames` are processed in chunks; one
    /// notification is produced per chunk. Returns the last one.
    pub fn process_mono(&mut self, block: &mut [f32]) -> EngineNotification {
        let mut last = EngineNotification {
            level: 0.0,
            tuner: None,
        };
        let max = self.mono.len();
        for chunk in block.chunks_mut(max) {
            last = self.process_chunk(chunk);
        }
        last
    }

    fn process_chunk(&mut self, block: &mut [f32]) -> EngineNotification {
        let gain = self.gain.get();
        for sample in block.iter_mut() {
            *sample *= gain;
        }
        self.chain.process(block);
        self.amp.process_block(block);

        let notification = EngineNotification {
            level: meter_level(block),
            tuner: self.tick_tuner(),
        };
        if let Some(producer) = self.notifications.as_mut() {
            // Full queue: the UI is behind, drop this update.
            let _ = producer.push(notification);
        }
        notification
    }

    /// Advance the tuner throttle; on every Nth block, read the tuner if it is on.
    fn tick_tuner(&mut self) -> Option<TunerReading> {
        self.tuner_timer += 1;
        if self.tuner_timer < self.tuner_interval {
            return None;
        }
        self.tuner_timer = 0;

        if !self.chain.tuner_active() {
            return None;
        }
        match self.chain.tuner_reading() {
            Ok(reading) => Some(reading.unwrap_or(TunerReading::NO_PITCH)),
            Err(e) => {
                log::warn!("Tuner analysis failed: {}", e);
                Some(TunerReading::NO_PITCH)
            }
        }
    }

    /// Process an interleaved callback buffer.
    ///
    /// Input with two or more channels is reduced to mono as `(L + R) * 0.5`;
    /// the processed mono signal is written to the first two output channels
    /// and any further output channels are silenced. Output frames with no
    /// matching input frame are zeroed.
    pub fn process_interleaved(
        &mut self,
        input: &[f32],
        in_channels: usize,
        output: &mut [f32],
        out_channels: usize,
    ) {
        if in_channels == 0 || out_channels == 0 {
            output.fill(0.0);
            return;
        }

        let in_frames = input.len() / in_channels;
        let out_frames = output.len() / out_channels;
        let frames = in_frames.min(out_frames);
        let max = self.mono.len();

        let mut start = 0;
        while start < frames {
            let n = (frames - start).min(max);
            let in_chunk = &input[start * in_channels..(start + n) * in_channels];
            for (m, frame) in self.mono[..n].iter_mut().zip(in_chunk.chunks_exact(in_channels)) {
                *m = if in_channels >= 2 {
                    (frame[0] + frame[1]) * 0.5
                } else {
                    frame[0]
                };
            }

            let mut mono = std::mem::take(&mut self.mono);
            self.process_chunk(&mut mono[..n]);

            let out_chunk = &mut output[start * out_channels..(start + n) * out_channels];
            for (frame, &s) in out_chunk.chunks_exact_mut(out_channels).zip(&mono[..n]) {
                for (ch, out) in frame.iter_mut().enumerate() {
                    *out = if ch < 2 { s } else { 0.0 };
                }
            }
            self.mono = mono;
            start += n;
        }

        output[frames * out_channels..].fill(0.0);
    }
}

/// Mean absolute value × meter scale. Zero for an empty block.
pub fn meter_level(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block.iter().map(|s| s.abs()).sum();
    sum / block.len() as f32 * METER_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PedalSpec;
    use crate::dsp::effect::EffectKind;
    use std::f64::consts::PI;

    fn engine() -> AudioEngine {
        AudioEngine::new(&EngineConfig::default(), 44100.0)
    }

    fn sine(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / 44100.0).sin()) as f32)
            .collect()
    }

    /// Expected output of the default amp with every pedal off.
    fn default_amp(x: f32) -> f32 {
        (x * 3.5).tanh() * 0.5 * 1.25 * 2.0
    }

    #[test]
    fn all_off_applies_only_gain_and_amp() {
        let mut e = engine();
        let input = sine(220.0, 256);
        let mut block = input.clone();
        e.process_mono(&mut block);
        for (out, inp) in block.iter().zip(&input) {
            assert!((out - default_amp(*inp)).abs() < 1e-5);
        }
    }

    #[test]
    fn gain_applies_before_chain() {
        let mut e = engine();
        e.gain_handle().set(0.0);
        let mut block = sine(220.0, 256);
        let n = e.process_mono(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
        assert_eq!(n.level, 0.0);
    }

    #[test]
    fn stereo_input_is_summed_and_duplicated() {
        let mut e = engine();
        // L = 0.2, R = 0.0 → mono 0.1
        let input: Vec<f32> = [0.2, 0.0].repeat(64);
        let mut output = vec![1.0; 128];
        e.process_interleaved(&input, 2, &mut output, 2);

        let expected = default_amp(0.1);
        for frame in output.chunks_exact(2) {
            assert!((frame[0] - expected).abs() < 1e-6);
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn mono_input_passes_channel_zero() {
        let mut e = engine();
        let input = vec![0.1; 32];
        let mut output = vec![0.0; 64];
        e.process_interleaved(&input, 1, &mut output, 2);
        assert!((output[0] - default_amp(0.1)).abs() < 1e-6);
    }

    #[test]
    fn extra_output_channels_are_silent() {
        let mut e = engine();
        let input = vec![0.1; 64];
        let mut output = vec![1.0; 4 * 32];
        e.process_interleaved(&input, 2, &mut output, 4);
        for frame in output.chunks_exact(4) {
            assert!(frame[0] > 0.0);
            assert_eq!(frame[1], frame[0]);
            assert_eq!(&frame[2..], &[0.0, 0.0]);
        }
    }

    #[test]
    fn oversized_callbacks_are_chunked() {
        let config = EngineConfig {
            max_block_frames: 64,
            ..EngineConfig::default()
        };
        let mut small = AudioEngine::new(&config, 44100.0);
        let mut large = engine();

        let input: Vec<f32> = sine(330.0, 1000).iter().flat_map(|&s| [s, s]).collect();
        let mut out_small = vec![0.0; 2000];
        let mut out_large = vec![0.0; 2000];
        small.process_interleaved(&input, 2, &mut out_small, 2);
        large.process_interleaved(&input, 2, &mut out_large, 2);
        assert_eq!(out_small, out_large);
    }

    #[test]
    fn short_input_zero_fills_output() {
        let mut e = engine();
        let input = vec![0.1; 20]; // 10 stereo frames
        let mut output = vec![1.0; 40]; // 20 stereo frames
        e.process_interleaved(&input, 2, &mut output, 2);
        assert!(output[..20].iter().all(|&s| s > 0.0));
        assert!(output[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn meter_is_mean_abs_times_twenty() {
        assert_eq!(meter_level(&[]), 0.0);
        assert!((meter_level(&[0.1, -0.1, 0.3, -0.3]) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn tuner_reported_every_fifth_block_when_on() {
        let mut e = engine();
        let tuner = e.chain().pedal("tuner").unwrap().controls().clone();
        let signal = sine(110.0, 512 * 20);

        let mut with_tuner = Vec::new();
        for (i, chunk) in signal.chunks(512).enumerate() {
            if i == 10 {
                tuner.set_active(true);
            }
            let mut block = chunk.to_vec();
            let n = e.process_mono(&mut block);
            if n.tuner.is_some() {
                with_tuner.push(i);
            }
        }
        // Blocks 4 and 9 fall while the tuner is off.
        assert_eq!(with_tuner, vec![14, 19]);
    }

    #[test]
    fn tuner_reading_through_engine() {
        let mut e = engine();
        e.chain().pedal("tuner").unwrap().controls().set_active(true);
        let signal = sine(110.0, 512 * 20);
        let mut last = None;
        for chunk in signal.chunks(512) {
            let mut block = chunk.to_vec();
            if let Some(r) = e.process_mono(&mut block).tuner {
                last = Some(r);
            }
        }
        let reading = last.unwrap();
        assert_eq!(reading.note, "A");
        assert!(reading.cents.abs() <= 5);
    }

    #[test]
    fn silent_tuner_reports_placeholder() {
        let mut e = engine();
        e.chain().pedal("tuner").unwrap().controls().set_active(true);
        let mut readings = Vec::new();
        for _ in 0..5 {
            let mut block = vec![0.0; 256];
            readings.extend(e.process_mono(&mut block).tuner);
        }
        assert_eq!(readings, vec![TunerReading::NO_PITCH]);
    }

    #[test]
    fn notifications_flow_through_queue() {
        let mut e = engine();
        let mut rx = e.open_notifications(4);
        for _ in 0..10 {
            let mut block = sine(220.0, 128);
            e.process_mono(&mut block);
        }
        // Capacity 4: the rest were dropped without blocking.
        let got = rx.drain();
        assert_eq!(got.len(), 4);
        assert!(got.iter().all(|n| n.level > 0.0));
        assert!(!rx.is_closed());

        e.close_notifications();
        assert!(rx.is_closed());
    }

    #[test]
    fn notification_json_shape() {
        let n = EngineNotification {
            level: 0.5,
            tuner: None,
        };
        assert_eq!(serde_json::to_string(&n).unwrap(), r#"{"level":0.5}"#);

        let n = EngineNotification {
            level: 0.5,
            tuner: Some(TunerReading { note: "E", cents: -3 }),
        };
        assert_eq!(
            serde_json::to_string(&n).unwrap(),
            r#"{"level":0.5,"tuner":{"note":"E","cents":-3}}"#
        );
    }

    #[test]
    fn sample_rate_change_reaches_effects() {
        let config = EngineConfig {
            chain: vec![PedalSpec::new("delay", EffectKind::Delay)],
            ..EngineConfig::default()
        };
        let mut e = AudioEngine::new(&config, 44100.0);
        e.set_sample_rate(48000.0);
        assert_eq!(e.sample_rate(), 48000.0);

        let delay = e.chain().pedal("delay").unwrap().controls().clone();
        delay.set_active(true);
        delay.params().set("time", 0.0);
        delay.params().set("intensity", 1.0);
        e.amp_controls().preamp.set(0.0);

        let mut block = vec![0.0; 2048];
        block[0] = 0.5;
        e.process_mono(&mut block);
        // 20 ms at 48 kHz
        assert!(block[959].abs() < 1e-9);
        assert!(block[960].abs() > 1e-3);
    }
}
