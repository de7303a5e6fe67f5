//! Audio capture via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** allocate heap memory, block on a mutex, or perform I/O.
//! This module satisfies that contract by converting samples into a reused
//! scratch buffer and writing them into the lock-free SPSC ring producer.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` therefore must be created and dropped on the same
//! thread; the engine does this inside the pipeline's `spawn_blocking`.

pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use serde::{Deserialize, Serialize};

#[cfg(feature = "audio-cpal")]
use crate::buffering::Producer;
use crate::{
    buffering::AudioProducer,
    error::{MandatumError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Metadata about an audio input device, for host device pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
}

/// Handle to an active audio capture stream.
///
/// **Not `Send`** — bound to its creation thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl AudioCapture {
    /// Open an input device by preferred name, falling back to the system
    /// default and then the first available device.
    pub fn open_with_preference(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();

        let mut selected = None;
        if let Some(preferred) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected =
                        devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        let device = if let Some(device) = selected {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| MandatumError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(MandatumError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| MandatumError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, producer, Arc::clone(&running), |s| s)
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, producer, Arc::clone(&running), |s| {
                    f32::from(s) / 32_768.0
                })
            }
            SampleFormat::U8 => {
                Self::build_stream::<u8>(&device, &config, producer, Arc::clone(&running), |s| {
                    (f32::from(s) - 128.0) / 128.0
                })
            }
            fmt => {
                return Err(MandatumError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| MandatumError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Build one input stream: convert to f32, downmix to mono into a reused
    /// scratch buffer, push into the ring.
    fn build_stream<S>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        convert: fn(S) -> f32,
    ) -> Result<Stream>
    where
        S: cpal::SizedSample + Send + 'static,
    {
        let channels = config.channels as usize;
        let mut mono_buf: Vec<f32> = Vec::new();

        device
            .build_input_stream(
                config,
                move |data: &[S], _info| {
                    if !running.load(Ordering::Relaxed) {
                        return;
                    }

                    let frames = data.len() / channels.max(1);
                    mono_buf.resize(frames, 0.0);
                    if channels <= 1 {
                        for (dst, &src) in mono_buf.iter_mut().zip(data.iter()) {
                            *dst = convert(src);
                        }
                    } else {
                        for (f, dst) in mono_buf.iter_mut().enumerate() {
                            let base = f * channels;
                            let mut sum = 0f32;
                            for c in 0..channels {
                                sum += convert(data[base + c]);
                            }
                            *dst = sum / channels as f32;
                        }
                    }

                    let written = producer.push_slice(&mono_buf);
                    if written < mono_buf.len() {
                        warn!(
                            "ring buffer full: dropped {} frames",
                            mono_buf.len() - written
                        );
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| MandatumError::AudioStream(e.to_string()))
    }

    /// Open the system default microphone.
    ///
    /// Must be called from the thread that will also drop this value — in
    /// practice, inside `tokio::task::spawn_blocking`.
    pub fn open_default(producer: AudioProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(MandatumError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(producer: AudioProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// List the available audio input devices, default first.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => {
            let mut list: Vec<DeviceInfo> = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect();
            list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
            list
        }
        Err(e) => {
            warn!("failed to enumerate input devices: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    Vec::new()
}
