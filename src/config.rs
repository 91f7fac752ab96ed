//! Engine configuration
//!
//! Sample-rate floor, buffer sizing, tuner cadence and the pedal line-up.
//! Loaded from JSON; every field has a default so partial files are fine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::effect::EffectKind;
use crate::error::ConfigError;

/// Lowest sample rate a stream is opened at.
pub const DEFAULT_MIN_SAMPLE_RATE: u32 = 44100;

/// Maximum block size to pre-allocate (frames). Larger callbacks are split.
pub const DEFAULT_MAX_BLOCK_FRAMES: usize = 8192;

/// Deliver a tuner reading every Nth block.
pub const DEFAULT_TUNER_INTERVAL: u32 = 5;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// One pedal on the board: the key it is addressed by and its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedalSpec {
    pub name: String,
    pub kind: EffectKind,
}

impl PedalSpec {
    pub fn new(name: impl Into<String>, kind: EffectKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The standard eleven-pedal board, tuner first and reverb last.
pub fn standard_chain() -> Vec<PedalSpec> {
    EffectKind::ALL
        .iter()
        .map(|&kind| PedalSpec::new(kind.default_key(), kind))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A device reporting a lower native rate streams at this rate instead.
    pub min_sample_rate: u32,
    pub max_block_frames: usize,
    pub tuner_interval: u32,
    pub notification_capacity: usize,
    /// Initial input gain.
    pub input_gain: f32,
    /// Pedals in signal order.
    pub chain: Vec<PedalSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample_rate: DEFAULT_MIN_SAMPLE_RATE,
            max_block_frames: DEFAULT_MAX_BLOCK_FRAMES,
            tuner_interval: DEFAULT_TUNER_INTERVAL,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            input_gain: 1.0,
            chain: standard_chain(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.is_empty() {
            return Err(ConfigError::EmptyChain);
        }
        for (i, spec) in self.chain.iter().enumerate() {
            if self.chain[..i].iter().any(|s| s.name == spec.name) {
                return Err(ConfigError::DuplicateEffect(spec.name.clone()));
            }
        }
        if self.min_sample_rate == 0 {
            return Err(ConfigError::InvalidValue("min_sample_rate must be > 0".into()));
        }
        if self.max_block_frames == 0 {
            return Err(ConfigError::InvalidValue("max_block_frames must be > 0".into()));
        }
        if self.tuner_interval == 0 {
            return Err(ConfigError::InvalidValue("tuner_interval must be > 0".into()));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "notification_capacity must be > 0".into(),
            ));
        }
        if !self.input_gain.is_finite() || self.input_gain < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "input_gain must be a finite, non-negative number (got {})",
                self.input_gain
            )));
        }
        Ok(())
    }
}

/// Load the engine config, falling back to defaults.
///
/// A missing file yields the default board. An unreadable or invalid file is
/// logged and also yields the default.
pub fn load_engine_config(path: &Path) -> EngineConfig {
    log::info!("load_engine_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_engine_config: Config file doesn't exist, using defaults");
        return EngineConfig::default();
    }

    match EngineConfig::load(path) {
        Ok(config) => {
            log::info!(
                "load_engine_config: Loaded {} pedal(s), min rate {} Hz",
                config.chain.len(),
                config.min_sample_rate
            );
            config
        }
        Err(e) => {
            log::warn!("load_engine_config: {}", e);
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chain.len(), 11);
        assert_eq!(config.chain[0], PedalSpec::new("tuner", EffectKind::Tuner));
        assert_eq!(config.chain[10], PedalSpec::new("reverb", EffectKind::Reverb));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{ "tuner_interval": 3 }"#).unwrap();
        assert_eq!(config.tuner_interval, 3);
        assert_eq!(config.min_sample_rate, 44100);
        assert_eq!(config.chain, standard_chain());
    }

    #[test]
    fn custom_chain_parses() {
        let json = r#"{
            "chain": [
                { "name": "od", "kind": "overdrive" },
                { "name": "echo", "kind": "delay" }
            ]
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.chain[1], PedalSpec::new("echo", EffectKind::Delay));
    }

    #[test]
    fn duplicate_names_rejected() {
        let json = r#"{ "chain": [
            { "name": "a", "kind": "fuzz" },
            { "name": "a", "kind": "booster" }
        ] }"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(ConfigError::DuplicateEffect(name)) if name == "a"
        ));
    }

    #[test]
    fn empty_chain_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "chain": [] }"#),
            Err(ConfigError::EmptyChain)
        ));
    }

    #[test]
    fn zero_values_rejected() {
        for json in [
            r#"{ "tuner_interval": 0 }"#,
            r#"{ "max_block_frames": 0 }"#,
            r#"{ "notification_capacity": 0 }"#,
            r#"{ "min_sample_rate": 0 }"#,
        ] {
            assert!(matches!(
                EngineConfig::from_json(json),
                Err(ConfigError::InvalidValue(_))
            ));
        }
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let json = r#"{ "chain": [ { "name": "x", "kind": "wah" } ] }"#;
        assert!(matches!(EngineConfig::from_json(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_engine_config(Path::new("/nonexistent/pedalboard.json"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("pedalboard-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "input_gain": 2.5 }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.input_gain, 2.5);
    }
}
