//! Error types for the pedalboard engine.

use thiserror::Error;

use crate::dsp::effect::EffectKind;

/// Stream and device failures, surfaced to the caller of `Pedalboard::start`.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio host error: {0}")]
    Host(String),
}

/// A failure inside one pedal's transform. Contained by the effect chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("{effect} produced a non-finite sample")]
    NonFinite { effect: EffectKind },

    #[error("Pitch analysis failed: {0}")]
    Analysis(String),
}

/// Invalid or unreadable engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Effect name '{0}' is used more than once")]
    DuplicateEffect(String),

    #[error("Effect chain is empty")]
    EmptyChain,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum PedalboardError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
