//! Audio device catalog and the stream adapter boundary.
//!
//! The engine never talks to a driver directly. An [`AudioBackend`] enumerates
//! devices and opens duplex streams; the returned [`StreamHandle`] keeps the
//! stream alive until stopped. The selection policy (which inputs to offer,
//! which output to pair with an input) lives here so every backend shares it.

use std::sync::{Arc, Mutex, TryLockError};

use serde::Serialize;

use crate::dsp::engine::AudioEngine;
use crate::error::DeviceError;

/// Host APIs listed first: simple, shared-mode drivers that rarely refuse a format.
const PREFERRED_HOST_APIS: [&str; 2] = ["MME", "DirectSound"];

/// Information about an audio device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Index in the backend's device list
    pub id: usize,
    /// Human-readable device name
    pub name: String,
    /// Host API the device is reached through (e.g. "ALSA", "MME", "Windows WDM-KS")
    pub host_api: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

impl DeviceInfo {
    /// Kernel-streaming devices are never offered.
    pub fn is_kernel_streaming(&self) -> bool {
        self.host_api.contains("KS") || self.name.contains("WDM-KS")
    }

    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }

    pub fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }

    /// Key used to pair the input and output of one interface.
    ///
    /// Windows names endpoints by role with the hardware in parentheses
    /// (`"Speakers (2- Focusrite USB Audio)"`), so the parenthesized part is
    /// preferred over the name itself. The key is the first word starting with
    /// a letter, lowercased.
    pub fn vendor(&self) -> Option<String> {
        let hardware = self
            .name
            .split_once('(')
            .map(|(_, rest)| rest.split(')').next().unwrap_or(rest))
            .filter(|inner| inner.chars().any(char::is_alphabetic))
            .unwrap_or(self.name.as_str());
        hardware
            .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .find(|w| w.chars().next().is_some_and(char::is_alphabetic))
            .map(str::to_lowercase)
    }

    fn has_preferred_host(&self) -> bool {
        PREFERRED_HOST_APIS
            .iter()
            .any(|api| self.host_api.contains(api) || self.name.contains(api))
    }

    /// Label shown in device pickers: `"name (host)"`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.host_api)
    }
}

/// Input devices to offer, kernel-streaming excluded, preferred host APIs first.
///
/// The sort is stable, so devices keep catalog order within each group.
pub fn list_inputs(devices: &[DeviceInfo]) -> Vec<DeviceInfo> {
    let mut inputs: Vec<DeviceInfo> = devices
        .iter()
        .filter(|d| d.is_input() && !d.is_kernel_streaming())
        .cloned()
        .collect();
    inputs.sort_by_key(|d| !d.has_preferred_host());
    inputs
}

/// Pick an output to pair with `input`.
///
/// Prefers a device on the same host API from the same vendor, then any output
/// on the same host API. `None` means the caller should use the system default.
pub fn match_output<'a>(input: &DeviceInfo, devices: &'a [DeviceInfo]) -> Option<&'a DeviceInfo> {
    let candidates: Vec<&DeviceInfo> = devices
        .iter()
        .filter(|d| d.is_output() && !d.is_kernel_streaming() && d.host_api == input.host_api)
        .collect();

    let vendor = input.vendor();
    if vendor.is_some() {
        if let Some(&d) = candidates.iter().find(|d| d.vendor() == vendor) {
            return Some(d);
        }
    }
    candidates.first().copied()
}

/// Everything a backend needs to open a duplex stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub input: DeviceInfo,
    pub output: DeviceInfo,
    pub sample_rate: u32,
    /// Channels requested on both sides.
    pub channels: u16,
}

/// A running stream. Dropping it also stops audio.
pub trait StreamHandle: Send {
    /// Stop and close the stream. Calling it twice is harmless.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// A driver layer able to enumerate devices and open duplex streams.
pub trait AudioBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;

    fn default_output(&self) -> Option<DeviceInfo>;

    /// Open and start a stream that feeds every callback through `engine`
    /// (normally via [`run_engine_callback`]).
    fn open(
        &self,
        request: &StreamRequest,
        engine: Arc<Mutex<AudioEngine>>,
    ) -> Result<Box<dyn StreamHandle>, DeviceError>;
}

/// Run one audio callback through the shared engine.
///
/// The lock is only tried: if the control side holds it, the callback writes
/// silence instead of waiting.
pub fn run_engine_callback(
    engine: &Mutex<AudioEngine>,
    input: &[f32],
    in_channels: usize,
    output: &mut [f32],
    out_channels: usize,
) {
    let mut guard = match engine.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            output.fill(0.0);
            return;
        }
    };
    guard.process_interleaved(input, in_channels, output, out_channels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn dev(id: usize, name: &str, host: &str, ins: u16, outs: u16) -> DeviceInfo {
        DeviceInfo {
            id,
            name: name.to_string(),
            host_api: host.to_string(),
            max_input_channels: ins,
            max_output_channels: outs,
            default_sample_rate: 48000,
        }
    }

    fn catalog() -> Vec<DeviceInfo> {
        vec![
            dev(0, "Focusrite USB", "Windows WASAPI", 2, 0),
            dev(1, "Focusrite USB", "Windows WDM-KS", 2, 2),
            dev(2, "Microphone (Realtek)", "MME", 1, 0),
            dev(3, "Speakers (Realtek)", "MME", 0, 2),
            dev(4, "Focusrite USB", "MME", 2, 0),
            dev(5, "Focusrite USB", "MME", 0, 2),
            dev(6, "Line In", "Windows DirectSound", 2, 0),
            dev(7, "Monitor", "Windows WASAPI", 0, 2),
        ]
    }

    #[test]
    fn inputs_exclude_ks_and_prefer_simple_hosts() {
        let ids: Vec<usize> = list_inputs(&catalog()).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 4, 6, 0]);
    }

    #[test]
    fn output_prefers_same_vendor_on_same_host() {
        let devices = catalog();
        let out = match_output(&devices[4], &devices).unwrap();
        assert_eq!(out.id, 5);
    }

    #[test]
    fn output_falls_back_to_same_host() {
        let devices = catalog();
        assert_eq!(match_output(&devices[2], &devices).unwrap().id, 3);
        assert_eq!(match_output(&devices[0], &devices).unwrap().id, 7);
    }

    #[test]
    fn no_output_on_host_means_default() {
        let devices = catalog();
        assert!(match_output(&devices[6], &devices).is_none());
    }

    #[test]
    fn vendor_prefers_parenthesized_hardware() {
        assert_eq!(catalog()[0].vendor().as_deref(), Some("focusrite"));
        assert_eq!(catalog()[2].vendor().as_deref(), Some("realtek"));
        assert_eq!(
            dev(9, "Speakers (2- Focusrite USB Audio)", "MME", 0, 2).vendor().as_deref(),
            Some("focusrite")
        );
        assert_eq!(dev(9, "Line In", "ALSA", 2, 0).vendor().as_deref(), Some("line"));
        assert_eq!(catalog()[1].display_name(), "Focusrite USB (Windows WDM-KS)");
    }

    #[test]
    fn windows_endpoint_names_pair_by_hardware() {
        let devices = vec![
            dev(0, "Microphone (Focusrite USB Audio)", "MME", 2, 0),
            dev(1, "Speakers (Realtek High Definition Audio)", "MME", 0, 2),
            dev(2, "Speakers (Focusrite USB Audio)", "MME", 0, 2),
        ];
        assert_eq!(match_output(&devices[0], &devices).unwrap().id, 2);
    }

    #[test]
    fn callback_outputs_silence_while_engine_busy() {
        let engine = Mutex::new(AudioEngine::new(&EngineConfig::default(), 44100.0));
        let input = vec![0.5; 64];
        let mut output = vec![1.0; 64];

        let guard = engine.lock().unwrap();
        run_engine_callback(&engine, &input, 2, &mut output, 2);
        assert!(output.iter().all(|&s| s == 0.0));
        drop(guard);

        run_engine_callback(&engine, &input, 2, &mut output, 2);
        assert!(output.iter().all(|&s| s > 0.0));
    }
}
