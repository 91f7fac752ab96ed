pub mod config;
pub mod control;
#[cfg(feature = "hardware")]
pub mod cpal_backend;
pub mod device;
pub mod dsp;
pub mod error;
pub mod pedalboard;

pub use config::{EngineConfig, PedalSpec, load_engine_config, standard_chain};
pub use control::{AmpSnapshot, ParameterStore, PedalSnapshot, StateSnapshot};
#[cfg(feature = "hardware")]
pub use cpal_backend::CpalBackend;
pub use device::{AudioBackend, DeviceInfo, StreamHandle, StreamRequest, list_inputs, match_output};
pub use dsp::effect::EffectKind;
pub use dsp::engine::{AudioEngine, EngineNotification, NotificationReceiver};
pub use dsp::tuner::TunerReading;
pub use error::{ConfigError, DeviceError, EffectError, PedalboardError};
pub use pedalboard::Pedalboard;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Return the pedalboard-core version string.
pub fn core_version() -> String {
    VERSION.to_string()
}
