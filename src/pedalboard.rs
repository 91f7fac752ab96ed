//! Pedalboard: the long-lived engine object owned by the application.
//!
//! Holds the block processor behind `Arc<Mutex<_>>` (locked by the audio
//! callback with `try_lock` only), the cloneable [`ParameterStore`], and the
//! current stream handle. Start and stop serialize on the handle's mutex, so
//! two requests can never race to open streams; a restart is always
//! stop-then-start.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::EngineConfig;
use crate::control::ParameterStore;
use crate::device::{AudioBackend, StreamHandle, StreamRequest, match_output};
use crate::dsp::engine::{AudioEngine, NotificationReceiver};
use crate::error::{DeviceError, PedalboardError};

/// Channels opened on both sides of the duplex stream.
pub const STREAM_CHANNELS: u16 = 2;

/// Sample rate the engine is built at before any stream is opened.
const INITIAL_SAMPLE_RATE: f64 = 44100.0;

struct ActiveStream {
    handle: Box<dyn StreamHandle>,
    request: StreamRequest,
}

pub struct Pedalboard {
    config: EngineConfig,
    engine: Arc<Mutex<AudioEngine>>,
    store: ParameterStore,
    stream: Mutex<Option<ActiveStream>>,
    /// Mirrors the engine's rate so queries never touch the engine lock.
    sample_rate: AtomicU32,
}

impl std::fmt::Debug for Pedalboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pedalboard")
            .field("config", &self.config)
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Pedalboard {
    /// Build an idle pedalboard from a validated config.
    pub fn new(config: EngineConfig) -> Result<Self, PedalboardError> {
        config.validate()?;
        log::info!(
            "Pedalboard ready: {} pedal(s) [{}]",
            config.chain.len(),
            config
                .chain
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self::build(config))
    }

    /// Pedalboard with the standard eleven pedals.
    pub fn with_defaults() -> Self {
        Self::build(EngineConfig::default())
    }

    fn build(config: EngineConfig) -> Self {
        let engine = AudioEngine::new(&config, INITIAL_SAMPLE_RATE);
        let store = ParameterStore::new(&engine);
        Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
            store,
            stream: Mutex::new(None),
            sample_rate: AtomicU32::new(INITIAL_SAMPLE_RATE as u32),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Thread-safe control surface; clone it into request handlers.
    pub fn controls(&self) -> &ParameterStore {
        &self.store
    }

    /// Shared handle to the block processor, for driving it without a backend.
    pub fn engine(&self) -> Arc<Mutex<AudioEngine>> {
        self.engine.clone()
    }

    pub fn is_streaming(&self) -> bool {
        lock(&self.stream).is_some()
    }

    /// Rate of the current (or most recent) stream.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// The request the running stream was opened with.
    pub fn current_stream(&self) -> Option<StreamRequest> {
        lock(&self.stream).as_ref().map(|s| s.request.clone())
    }

    /// Open a duplex stream on `input_id`, replacing any running stream.
    ///
    /// Returns the receiving end of the notification queue for this stream.
    pub fn start(
        &self,
        backend: &dyn AudioBackend,
        input_id: usize,
    ) -> Result<NotificationReceiver, DeviceError> {
        let mut stream = lock(&self.stream);
        Self::teardown(&mut stream);

        let devices = backend.devices()?;
        let input = devices
            .iter()
            .find(|d| d.id == input_id && d.is_input())
            .cloned()
            .ok_or_else(|| DeviceError::DeviceNotFound(input_id.to_string()))?;

        let sample_rate = input.default_sample_rate.max(self.config.min_sample_rate);

        let output = match match_output(&input, &devices) {
            Some(d) => d.clone(),
            None => backend.default_output().ok_or(DeviceError::NoOutputDevice)?,
        };

        let request = StreamRequest {
            input,
            output,
            sample_rate,
            channels: STREAM_CHANNELS,
        };

        let receiver = {
            let mut engine = lock(&self.engine);
            if engine.sample_rate() != sample_rate as f64 {
                engine.set_sample_rate(sample_rate as f64);
            }
            self.sample_rate.store(sample_rate, Ordering::Relaxed);
            engine.open_notifications(self.config.notification_capacity)
        };

        log::info!(
            "Connecting: {} -> {} @ {} Hz",
            request.input.display_name(),
            request.output.display_name(),
            sample_rate
        );

        let handle = match backend.open(&request, self.engine.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                lock(&self.engine).close_notifications();
                log::warn!("Failed to open stream: {}", e);
                return Err(e);
            }
        };

        log::info!("Audio stream started");
        *stream = Some(ActiveStream { handle, request });
        Ok(receiver)
    }

    /// Stop the running stream, if any. Teardown errors are logged and swallowed.
    pub fn stop(&self) {
        let mut stream = lock(&self.stream);
        Self::teardown(&mut stream);
    }

    fn teardown(stream: &mut Option<ActiveStream>) {
        if let Some(mut active) = stream.take() {
            if let Err(e) = active.handle.stop() {
                log::warn!("Ignoring error while stopping stream: {}", e);
            }
            log::info!("Audio stream stopped");
        }
    }
}

impl Drop for Pedalboard {
    fn drop(&mut self) {
        let stream = self
            .stream
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::teardown(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PedalSpec;
    use crate::device::DeviceInfo;
    use crate::dsp::effect::EffectKind;
    use crate::error::ConfigError;

    struct NoDevices;

    impl AudioBackend for NoDevices {
        fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
            Ok(Vec::new())
        }

        fn default_output(&self) -> Option<DeviceInfo> {
            None
        }

        fn open(
            &self,
            _request: &StreamRequest,
            _engine: Arc<Mutex<AudioEngine>>,
        ) -> Result<Box<dyn StreamHandle>, DeviceError> {
            Err(DeviceError::StreamBuild("no hardware".into()))
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            chain: vec![
                PedalSpec::new("x", EffectKind::Fuzz),
                PedalSpec::new("x", EffectKind::Fuzz),
            ],
            ..EngineConfig::default()
        };
        assert!(matches!(
            Pedalboard::new(config),
            Err(PedalboardError::Config(ConfigError::DuplicateEffect(_)))
        ));
    }

    #[test]
    fn starts_idle() {
        let board = Pedalboard::with_defaults();
        assert!(!board.is_streaming());
        assert_eq!(board.sample_rate(), 44100);
        assert_eq!(board.controls().effect_names().count(), 11);
    }

    #[test]
    fn unknown_device_is_an_error() {
        let board = Pedalboard::with_defaults();
        let err = board.start(&NoDevices, 3).unwrap_err();
        assert!(matches!(err, DeviceError::DeviceNotFound(id) if id == "3"));
        assert!(!board.is_streaming());
    }

    #[test]
    fn stop_when_idle_is_harmless() {
        let board = Pedalboard::with_defaults();
        board.stop();
        board.stop();
        assert!(!board.is_streaming());
    }
}
