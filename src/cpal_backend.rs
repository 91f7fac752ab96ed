//! Hardware stream adapter on cpal.
//!
//! Devices from every available host are flattened into one list; a device id
//! is its index in that list. A duplex stream is a pair of cpal streams: the
//! input callback converts to f32 and pushes into a lock-free sample queue, the
//! output callback pops from it (silence when it runs dry), runs the engine and
//! writes the result.
//!
//! cpal streams cannot cross threads on every platform, so each duplex stream
//! is built, owned and finally paused by a dedicated thread. The returned
//! handle only holds that thread's stop channel.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::device::{AudioBackend, DeviceInfo, StreamHandle, StreamRequest, run_engine_callback};
use crate::dsp::engine::AudioEngine;
use crate::error::{DeviceError, DeviceResult};

/// Frames moved from the sample queue to the engine per step of the output callback.
const CALLBACK_CHUNK_FRAMES: usize = 1024;

/// Sample queue size, in callback chunks. The input side drops samples once it is full.
const INPUT_QUEUE_CHUNKS: usize = 8;

/// Queued input the output callback tolerates, in callback periods, before
/// discarding the oldest samples. Bounds the latency clock drift can build up.
const MAX_BACKLOG_PERIODS: usize = 2;

/// Rate reported for a device whose default config cannot be read.
const FALLBACK_SAMPLE_RATE: u32 = 44100;

struct CatalogEntry {
    info: DeviceInfo,
    device: cpal::Device,
}

/// Enumerate devices from ALL hosts, in host order.
fn enumerate() -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        let devices = match host.devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };

            let max_input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let max_output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            if max_input_channels == 0 && max_output_channels == 0 {
                continue;
            }

            let default_sample_rate = device
                .default_input_config()
                .or_else(|_| device.default_output_config())
                .map(|c| c.sample_rate().0)
                .unwrap_or(FALLBACK_SAMPLE_RATE);

            let info = DeviceInfo {
                id: entries.len(),
                name,
                host_api: host_id.name().to_string(),
                max_input_channels,
                max_output_channels,
                default_sample_rate,
            };
            entries.push(CatalogEntry { info, device });
        }
    }

    entries
}

/// Find the catalog entry for `info`, refusing a stale id that now names another device.
fn locate<'a>(entries: &'a [CatalogEntry], info: &DeviceInfo) -> DeviceResult<&'a CatalogEntry> {
    entries
        .get(info.id)
        .filter(|e| e.info.name == info.name && e.info.host_api == info.host_api)
        .ok_or_else(|| DeviceError::DeviceNotFound(info.display_name()))
}

/// Channels to open: the request, limited to what the device offers, at least one.
fn stream_channels(requested: u16, available: u16) -> u16 {
    requested.min(available).max(1)
}

/// cpal devices reached through every available host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        Ok(enumerate().into_iter().map(|e| e.info).collect())
    }

    fn default_output(&self) -> Option<DeviceInfo> {
        let host = cpal::default_host();
        let host_api = host.id().name();
        let name = host.default_output_device()?.name().ok()?;
        enumerate()
            .into_iter()
            .map(|e| e.info)
            .find(|d| d.host_api == host_api && d.name == name && d.is_output())
    }

    fn open(
        &self,
        request: &StreamRequest,
        engine: Arc<Mutex<AudioEngine>>,
    ) -> Result<Box<dyn StreamHandle>, DeviceError> {
        let (ready_tx, ready_rx) = mpsc::channel::<DeviceResult<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let request = request.clone();

        let thread = thread::Builder::new()
            .name("pedalboard-stream".into())
            .spawn(move || -> DeviceResult<()> {
                let streams = match build_duplex(&request, engine) {
                    Ok(streams) => streams,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(());
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Parked until the handle sends stop or is dropped.
                let _ = stop_rx.recv();

                let (input, output) = streams;
                let paused_out = output.pause();
                let paused_in = input.pause();
                paused_out
                    .and(paused_in)
                    .map_err(|e| DeviceError::StreamPlay(e.to_string()))
            })
            .map_err(|e| DeviceError::Host(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStreamHandle {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DeviceError::StreamBuild("stream thread exited during setup".into()))
            }
        }
    }
}

/// Keeps a duplex stream alive on its owning thread.
struct CpalStreamHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<DeviceResult<()>>>,
}

impl StreamHandle for CpalStreamHandle {
    fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| DeviceError::StreamPlay("stream thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Drop for CpalStreamHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Stream teardown on drop: {}", e);
        }
    }
}

/// Build and start the input and output streams for `request`.
fn build_duplex(
    request: &StreamRequest,
    engine: Arc<Mutex<AudioEngine>>,
) -> DeviceResult<(Stream, Stream)> {
    let entries = enumerate();
    let input = locate(&entries, &request.input)?;
    let output = locate(&entries, &request.output)?;

    let sample_rate = cpal::SampleRate(request.sample_rate);
    let rate_supported = input
        .device
        .supported_input_configs()
        .map(|mut configs| {
            configs.any(|c| c.min_sample_rate() <= sample_rate && sample_rate <= c.max_sample_rate())
        })
        .unwrap_or(true);
    if !rate_supported {
        return Err(DeviceError::UnsupportedSampleRate(request.sample_rate));
    }

    let in_channels = stream_channels(request.channels, input.info.max_input_channels);
    let out_channels = stream_channels(request.channels, output.info.max_output_channels);

    let input_format = input
        .device
        .default_input_config()
        .map_err(|e| DeviceError::Config(e.to_string()))?
        .sample_format();

    let in_config = StreamConfig {
        channels: in_channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let out_config = StreamConfig {
        channels: out_channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let capacity = INPUT_QUEUE_CHUNKS * CALLBACK_CHUNK_FRAMES * in_channels as usize;
    let (producer, consumer) = rtrb::RingBuffer::<f32>::new(capacity);

    let input_stream = match input_format {
        SampleFormat::F32 => build_input_stream::<f32>(&input.device, &in_config, producer),
        SampleFormat::I16 => build_input_stream::<i16>(&input.device, &in_config, producer),
        SampleFormat::I32 => build_input_stream::<i32>(&input.device, &in_config, producer),
        format => Err(DeviceError::UnsupportedFormat(format!("{:?}", format))),
    }?;
    let output_stream = build_output_stream(
        &output.device,
        &out_config,
        consumer,
        in_channels as usize,
        engine,
    )?;

    input_stream
        .play()
        .map_err(|e| DeviceError::StreamPlay(e.to_string()))?;
    output_stream
        .play()
        .map_err(|e| DeviceError::StreamPlay(e.to_string()))?;

    log::info!(
        "cpal duplex stream: {} ch in ({:?}), {} ch out @ {} Hz",
        in_channels,
        input_format,
        out_channels,
        request.sample_rate
    );
    Ok((input_stream, output_stream))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: rtrb::Producer<f32>,
) -> DeviceResult<Stream>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    // Queue full: the output side stalled, drop input.
                    if producer.push(f32::from_sample_(sample)).is_err() {
                        break;
                    }
                }
            },
            |err| log::error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| DeviceError::StreamBuild(e.to_string()))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: rtrb::Consumer<f32>,
    in_channels: usize,
    engine: Arc<Mutex<AudioEngine>>,
) -> DeviceResult<Stream> {
    let out_channels = config.channels as usize;
    let mut input = vec![0.0f32; CALLBACK_CHUNK_FRAMES * in_channels];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / out_channels;
                let period = frames.max(CALLBACK_CHUNK_FRAMES);
                discard_backlog(&mut consumer, period * MAX_BACKLOG_PERIODS * in_channels, in_channels);

                let mut start = 0;
                while start < frames {
                    let n = (frames - start).min(CALLBACK_CHUNK_FRAMES);
                    let chunk_in = &mut input[..n * in_channels];
                    for sample in chunk_in.iter_mut() {
                        *sample = consumer.pop().unwrap_or(0.0);
                    }
                    let chunk_out = &mut data[start * out_channels..(start + n) * out_channels];
                    run_engine_callback(&engine, chunk_in, in_channels, chunk_out, out_channels);
                    start += n;
                }
                data[frames * out_channels..].fill(0.0);
            },
            |err| log::error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| DeviceError::StreamBuild(e.to_string()))
}

/// Drop the oldest queued samples beyond `keep`, in whole frames. Returns the number dropped.
fn discard_backlog(consumer: &mut rtrb::Consumer<f32>, keep: usize, channels: usize) -> usize {
    let excess = consumer.slots().saturating_sub(keep);
    let excess = excess - excess % channels.max(1);
    if excess == 0 {
        return 0;
    }
    match consumer.read_chunk(excess) {
        Ok(chunk) => {
            chunk.commit_all();
            excess
        }
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_limited_by_device() {
        assert_eq!(stream_channels(2, 8), 2);
        assert_eq!(stream_channels(2, 1), 1);
        assert_eq!(stream_channels(2, 0), 1);
    }

    #[test]
    fn backlog_is_trimmed_to_newest_frames() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(64);
        for i in 0..50 {
            producer.push(i as f32).unwrap();
        }

        assert_eq!(discard_backlog(&mut consumer, 20, 2), 30);
        assert_eq!(consumer.slots(), 20);
        assert_eq!(consumer.pop().unwrap(), 30.0);

        // Under the limit: nothing dropped.
        assert_eq!(discard_backlog(&mut consumer, 20, 2), 0);
        assert_eq!(consumer.slots(), 19);
    }

    #[test]
    fn backlog_trim_keeps_frames_whole() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(16);
        for i in 0..9 {
            producer.push(i as f32).unwrap();
        }
        // 5 excess samples with stereo frames: only 4 go.
        assert_eq!(discard_backlog(&mut consumer, 4, 2), 4);
        assert_eq!(consumer.pop().unwrap(), 4.0);
    }

    #[test]
    fn device_ids_are_list_indices() {
        // Works with or without audio hardware present.
        let devices = CpalBackend::new().devices().unwrap();
        for (i, d) in devices.iter().enumerate() {
            assert_eq!(d.id, i);
            assert!(d.is_input() || d.is_output());
        }
    }
}
